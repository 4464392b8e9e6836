pub mod cli;
pub mod columnar;
pub mod config;
pub mod http_client;
pub mod join;
pub mod normalize;
pub mod probe;
pub mod report;
pub mod snapshot;
pub mod sources;
pub mod table;
pub mod team_names;
