/// API path prefix, every route below is mounted under it
pub const API_PREFIX: &str = "/v1";

/// Port lookup route, `:key` is a port number or a service name
pub const ROUTE_PORTS: &str = "/ports/:key";

/// Protocol description route
pub const ROUTE_DESCRIBE: &str = "/describe/:protocol";

/// Store status route
pub const ROUTE_STATUS: &str = "/status";

/// Separator placed between protocols of one merged record
pub const PROTOCOL_SEPARATOR: &str = ", ";
