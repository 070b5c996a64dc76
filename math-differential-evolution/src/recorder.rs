//! Trace persistence.
//!
//! A trace file is CSV: the header names one column per snapshot index
//! (`0,1,...,iterations`), every following line is one run's optimal-value
//! trace. Values are written with 17 significant digits, so reading a file
//! back reproduces the traces exactly.

use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::info;

use crate::error::{DEError, Result};

/// Cache directory for trace files, created if missing.
pub fn default_records_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("org", "spinorama", "math-differential-evolution").ok_or(
        DEError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "failed to determine project directories",
        )),
    )?;

    let records_dir = proj_dirs.cache_dir().join("records");
    create_dir_all(&records_dir)?;
    Ok(records_dir)
}

/// Writes `traces` (all of the same length) as CSV to `out`.
pub fn write_traces<W: Write>(out: W, traces: &[Vec<f64>]) -> Result<()> {
    let mut out = BufWriter::new(out);
    let Some(first) = traces.first() else {
        return Ok(());
    };
    let columns = first.len();

    let header: Vec<String> = (0..columns).map(|i| i.to_string()).collect();
    writeln!(out, "{}", header.join(","))?;
    for (row, trace) in traces.iter().enumerate() {
        if trace.len() != columns {
            return Err(DEError::TraceFormat {
                line: row + 2,
                reason: format!("trace has {} values, expected {}", trace.len(), columns),
            });
        }
        let cells: Vec<String> = trace.iter().map(|v| format!("{:.16e}", v)).collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    out.flush()?;
    Ok(())
}

/// Parses CSV produced by [`write_traces`].
pub fn read_traces<R: BufRead>(input: R) -> Result<Vec<Vec<f64>>> {
    let mut lines = input.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Ok(Vec::new()),
    };
    let columns = header.split(',').count();
    for (i, name) in header.split(',').enumerate() {
        if name.trim().parse::<usize>().ok() != Some(i) {
            return Err(DEError::TraceFormat {
                line: 1,
                reason: format!("column {} is named '{}', expected '{}'", i, name, i),
            });
        }
    }

    let mut traces = Vec::new();
    for (row, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let trace = line
            .split(',')
            .map(|cell| {
                cell.trim().parse::<f64>().map_err(|e| DEError::TraceFormat {
                    line: row + 2,
                    reason: format!("'{}': {}", cell, e),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if trace.len() != columns {
            return Err(DEError::TraceFormat {
                line: row + 2,
                reason: format!("{} values for {} columns", trace.len(), columns),
            });
        }
        traces.push(trace);
    }
    Ok(traces)
}

/// Writes traces to a CSV file, creating parent directories.
pub fn write_traces_csv<P: AsRef<Path>>(path: P, traces: &[Vec<f64>]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    write_traces(File::create(path)?, traces)?;
    info!("wrote {} traces to {}", traces.len(), path.display());
    Ok(())
}

/// Reads traces from a CSV file.
pub fn read_traces_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    read_traces(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let mut buf = Vec::new();
        write_traces(&mut buf, &[vec![3.0, 2.0, 1.0], vec![1.5, 1.5, 0.25]]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("0,1,2"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_file_round_trip_is_exact() {
        let traces = vec![
            vec![1.0 / 3.0, 0.1 + 0.2, 1e-300],
            vec![std::f64::consts::PI, 2.5e10, 0.0],
        ];
        let path = std::env::temp_dir()
            .join(format!("mde-recorder-{}", std::process::id()))
            .join("traces.csv");
        write_traces_csv(&path, &traces).unwrap();
        let back = read_traces_csv(&path).unwrap();
        assert_eq!(back, traces);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_engine_traces_round_trip() {
        use crate::{DEConfig, DifferentialEvolution, Simulations, UniformInitializer};
        use crate::simulation::successful_traces;
        use ndarray::Array1;

        let rastrigin = |x: &Array1<f64>| {
            10.0 * x.len() as f64
                + x.iter()
                    .map(|&v| v * v - 10.0 * (2.0 * std::f64::consts::PI * v).cos())
                    .sum::<f64>()
        };
        let init = UniformInitializer::cube(-5.12, 5.12, 3).unwrap();
        let engine = DifferentialEvolution::new(&rastrigin, &init);
        let config = DEConfig {
            iterations: 15,
            population_size: 12,
            seed: Some(11),
            ..DEConfig::default()
        };
        let single = engine.run(&config).unwrap().optimal_values();
        let mut traces = successful_traces(Simulations::new(3).with_seed(3).run(&engine, &config));
        traces.insert(0, single);

        let path = std::env::temp_dir()
            .join(format!("mde-recorder-engine-{}", std::process::id()))
            .join("traces.csv");
        write_traces_csv(&path, &traces).unwrap();
        let back = read_traces_csv(&path).unwrap();
        assert_eq!(back.len(), 4);
        assert!(back.iter().all(|t| t.len() == config.iterations + 1));
        assert_eq!(back, traces);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_ragged_traces_rejected() {
        let mut buf = Vec::new();
        let err = write_traces(&mut buf, &[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, DEError::TraceFormat { line: 3, .. }));
    }

    #[test]
    fn test_malformed_input() {
        let err = read_traces("0,1\n1.0,abc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DEError::TraceFormat { line: 2, .. }));
        let err = read_traces("0,2\n1.0,2.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DEError::TraceFormat { line: 1, .. }));
        assert!(read_traces("".as_bytes()).unwrap().is_empty());
    }
}
