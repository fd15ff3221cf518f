// Snapvault Infrastructure - System Adapters
// Implements: TransferGateway, CredentialProvisioner, TimeSeriesApi, RelationalApi

pub mod cloud_transfer;
pub mod constants;
pub mod credential_files;
pub mod endpoint;
pub mod influx_tool;
pub mod postgres_tool;
pub mod subprocess_runner;

pub use cloud_transfer::CliTransferGateway;
pub use credential_files::FileCredentialProvisioner;
pub use influx_tool::InfluxDumpTool;
pub use postgres_tool::PgStreamTool;
pub use subprocess_runner::{CommandError, CommandOutput, CommandSpec, SubprocessRunner};
