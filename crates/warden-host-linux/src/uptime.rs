//! Host uptime, for crash-recovery heuristics

use std::path::Path;
use std::time::Duration;
use warden_host_api::{HostError, HostResult};

const PROC_UPTIME: &str = "/proc/uptime";

/// Seconds since the host booted, from `/proc/uptime`
pub fn uptime() -> HostResult<Duration> {
    uptime_from(Path::new(PROC_UPTIME))
}

fn uptime_from(path: &Path) -> HostResult<Duration> {
    let content = std::fs::read_to_string(path)?;
    parse_uptime(&content)
}

/// `/proc/uptime` holds two floats; the first is seconds up
fn parse_uptime(content: &str) -> HostResult<Duration> {
    let seconds: f64 = content
        .split_whitespace()
        .next()
        .ok_or_else(|| HostError::Unavailable("empty uptime file".into()))?
        .parse()
        .map_err(|e| HostError::Unavailable(format!("unparseable uptime: {}", e)))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(HostError::Unavailable("nonsense uptime value".into()));
    }

    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proc_uptime_format() {
        let d = parse_uptime("350735.47 234388.90\n").unwrap();
        assert_eq!(d.as_secs(), 350735);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("soon").is_err());
    }

    #[test]
    fn reads_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "123.45 67.89").unwrap();

        let d = uptime_from(file.path()).unwrap();
        assert_eq!(d.as_secs(), 123);
    }
}
