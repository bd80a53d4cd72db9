//! Worklist execution for liquid-handling robots.
//!
//! Parsed worklists are validated into plans, then replayed against a
//! [`lh_core::Runtime`]. [`SimulatedRuntime`] stands in for the robot in
//! tests and dry runs.

pub mod config;
pub mod distribute;
pub mod executor;
pub mod instrument;
pub mod labware;
pub mod report;
pub mod simulator;
pub mod transfer;

pub use config::{
    load_config, load_or_default, to_yaml_string, BlowOutSettings, DilutionConfig,
    DistributeSettings, LabwarePlacement, PipettePlacement, PoolingConfig, ProtocolMetadata,
    TransferSettings,
};
pub use distribute::{plan_distribute, DistributePlan, DistributeStep, RefillDecision, RefillPolicy};
pub use executor::{plan_dilution, plan_pooling, DilutionPlan, Executor, PoolingPlan};
pub use instrument::{
    PipetteModel, PipetteStats, PipetteTracker, TipState, TouchTip, SUPPORTED_PIPETTES,
    TOUCH_SPEED_RANGE,
};
pub use labware::{LabwareCatalog, LabwareDefinition, LabwareKind};
pub use report::{read_json, write_json, ExecutionReport, PhaseReport};
pub use simulator::{Command, CommandKind, SimulatedRuntime};
pub use transfer::{run_distribute, run_fixed_height, PhaseCounters};
