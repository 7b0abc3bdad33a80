use crate::errors::AppError;
use serde::Serialize;
use std::io::Write;

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut out: W, value: &T) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
