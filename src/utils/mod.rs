/// Utility functions and helpers
use crate::error::{TandemError, TandemResult};
use std::time::Duration;

/// Port used when a server string does not name one
pub const DEFAULT_PORT: u16 = 27017;

/// Split a server string into host and port.
///
/// Accepts `host`, `host:port`, `[v6addr]:port`, a bare IPv6 literal, or an
/// absolute path naming a domain socket (returned with port 0).
pub fn parse_server(server: &str) -> TandemResult<(String, u16)> {
    let server = server.trim();
    if server.is_empty() {
        return Err(invalid_server(server, "empty server string"));
    }

    if server.starts_with('/') {
        return Ok((server.to_string(), 0));
    }

    if let Some(rest) = server.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| invalid_server(server, "unterminated '['"))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => parse_port(server, p)?,
            None if tail.is_empty() => DEFAULT_PORT,
            None => return Err(invalid_server(server, "unexpected text after ']'")),
        };
        return Ok((host.to_string(), port));
    }

    // More than one colon without brackets is a bare IPv6 literal
    if server.matches(':').count() > 1 {
        return Ok((server.to_string(), DEFAULT_PORT));
    }

    match server.split_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(server, port)?)),
        Some(_) => Err(invalid_server(server, "missing host")),
        None => Ok((server.to_string(), DEFAULT_PORT)),
    }
}

fn parse_port(server: &str, port: &str) -> TandemResult<u16> {
    match port.parse::<u16>() {
        Ok(0) => Err(invalid_server(server, "port 0 is reserved for domain sockets")),
        Ok(p) => Ok(p),
        Err(_) => Err(invalid_server(server, "invalid port")),
    }
}

fn invalid_server(server: &str, message: &str) -> TandemError {
    TandemError::AddressResolution {
        host: server.to_string(),
        message: message.to_string(),
    }
}

/// Check `<database>.<collection>[.<sub>]*` form
pub fn validate_namespace(ns: &str) -> TandemResult<()> {
    match ns.split_once('.') {
        Some((db, coll)) if !db.is_empty() && !coll.is_empty() && !ns.contains('\0') => Ok(()),
        _ => Err(TandemError::InvalidNamespace(ns.to_string())),
    }
}

/// Database part of a namespace
pub fn database_of(ns: &str) -> &str {
    ns.split_once('.').map(|(db, _)| db).unwrap_or(ns)
}

/// Namespace administrative commands are sent to
pub fn command_namespace(db: &str) -> String {
    format!("{}.$cmd", db)
}

/// Format duration for human-readable output
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return format!("{}ms", millis);
    }
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server() {
        assert_eq!(parse_server("db1").unwrap(), ("db1".to_string(), 27017));
        assert_eq!(
            parse_server("10.0.1.10:27018").unwrap(),
            ("10.0.1.10".to_string(), 27018)
        );
        assert_eq!(parse_server("[::1]:4000").unwrap(), ("::1".to_string(), 4000));
        assert_eq!(parse_server("[::1]").unwrap(), ("::1".to_string(), 27017));
        assert_eq!(parse_server("fe80::1").unwrap(), ("fe80::1".to_string(), 27017));
        assert_eq!(
            parse_server("/tmp/db.sock").unwrap(),
            ("/tmp/db.sock".to_string(), 0)
        );
    }

    #[test]
    fn test_parse_server_rejects_garbage() {
        assert!(parse_server("").is_err());
        assert!(parse_server("db1:abc").is_err());
        assert!(parse_server("db1:0").is_err());
        assert!(parse_server(":27017").is_err());
        assert!(parse_server("[::1").is_err());
    }

    #[test]
    fn test_namespaces() {
        assert!(validate_namespace("app.users").is_ok());
        assert!(validate_namespace("app.system.indexes").is_ok());
        assert!(validate_namespace("app").is_err());
        assert!(validate_namespace(".users").is_err());
        assert!(validate_namespace("app.").is_err());

        assert_eq!(database_of("app.system.indexes"), "app");
        assert_eq!(command_namespace("admin"), "admin.$cmd");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");
    }
}
