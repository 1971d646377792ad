pub mod container_routes;
pub mod country_routes;
pub mod port_routes;
pub mod registry_routes;
