use log::info;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::BowResult;

/// Significant digits of numbers written to tables.
const PRECISION: usize = 6;

/// Path of the table written for an output name: `<name>.dat`.
pub fn dat_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{}.dat", name))
}

/// Format a number like `printf("%g")`: six significant digits, trailing
/// zeros removed, scientific notation for very small or large magnitudes.
pub fn format_general(value: f64) -> String {
    if value == 0. {
        return "0".to_string();
    }
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0. {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    // Round to the requested digits first, the exponent may change.
    let sci = format!("{:.*e}", PRECISION - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Write a two column table: a `#` header line, then `<index> <value>` rows.
pub fn write_table<P, I>(path: P, header: &str, rows: I) -> BowResult<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (usize, f64)>,
{
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "#{}", header)?;
    let mut n = 0;
    for (i, v) in rows {
        writeln!(out, "{} {}", i, format_general(v))?;
        n += 1;
    }
    out.flush()?;
    info!("Wrote {} rows to {:?}", n, path);
    Ok(n)
}
