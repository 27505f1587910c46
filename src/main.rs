/// Entry point for cgmeter.
///
/// Discovers the cgroup v1 limits of this process and prints utilization samples as
/// JSON lines until interrupted.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug CGMETER_INTERVAL_SECS=2 CGMETER_SAMPLES=10 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    cgmeter::run().await
}
