// Host strings: `name` or `name:port`

/// Split an optional `:port` suffix off a host string
pub fn split_host(host: &str, default_port: u16) -> (String, u16) {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() => match port.parse::<u16>() {
            Ok(port) => (name.to_string(), port),
            Err(_) => (host.to_string(), default_port),
        },
        _ => (host.to_string(), default_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host() {
        assert_eq!(split_host("pg-0", 5432), ("pg-0".to_string(), 5432));
        assert_eq!(split_host("pg-0:6432", 5432), ("pg-0".to_string(), 6432));
        assert_eq!(split_host("pg-0:abc", 5432), ("pg-0:abc".to_string(), 5432));
    }
}
