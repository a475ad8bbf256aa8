pub mod clock;
pub mod logging;
pub mod virsh;
pub mod workload;
