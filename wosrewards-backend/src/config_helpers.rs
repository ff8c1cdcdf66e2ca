use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use wosrewards_db::DbConnectionConfig;

/// Build database connection config from application config.
///
/// A bare file path is treated as a SQLite file and created on first use.
pub fn database_config_from_config(cfg: &wosrewards_config::Config) -> DbConnectionConfig {
    let path = cfg.database.path.trim();
    let url = if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite://{path}")
    };
    let db_cfg = DbConnectionConfig::new(url);
    match cfg.database.max_connections {
        Some(max) => db_cfg.with_max_connections(max.max(1)),
        None => db_cfg,
    }
}

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| host.parse::<Ipv6Addr>().map(|ip| SocketAddr::new(IpAddr::V6(ip), port)))
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}
