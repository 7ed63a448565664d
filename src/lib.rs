// TerraLog — Core Library
//
// Hardware-independent part of the firmware: the sample data model, the
// soil classification, the fault reporter, the CSV sink, the presentation
// layer and the cycle scheduler, all written against the peripheral traits
// in `peripherals`. The `terralog` binary wires these to the real ESP32
// drivers; the unit tests wire them to in-memory mocks.

pub mod acquire;
pub mod config;
pub mod fault;
pub mod peripherals;
pub mod persist;
pub mod present;
pub mod sample;
pub mod scheduler;
pub mod soil;
