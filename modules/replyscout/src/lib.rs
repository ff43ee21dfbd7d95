pub mod aws;
pub mod classifier;
pub mod delay;
pub mod detector;
pub mod reddit;
pub mod records;
pub mod responder;
pub mod telemetry;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
