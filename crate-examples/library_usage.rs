// Example of using golden as a library.

use golden::output::NullOutputHandler;
use golden::{GoldenConfig, LogLevel, OutputHandler, TerminalOutputHandler};
use std::sync::Arc;

fn main() -> golden::Result<()> {
    simple_example()?;
    advanced_example()?;
    custom_output_example()?;
    Ok(())
}

fn simple_example() -> golden::Result<()> {
    println!("=== Simple Example ===");

    let config = GoldenConfig::new().root_dir("./fleet").group("web1");

    let output = Arc::new(TerminalOutputHandler::new(1));
    let report = golden::run(&config, output)?;

    println!("Deployment completed. Hosts failed: {}", report.total_failed());
    Ok(())
}

fn advanced_example() -> golden::Result<()> {
    println!("\n=== Advanced Example ===");

    let config = GoldenConfig::new()
        .root_dir("./fleet")
        .manifest("production")
        .apps(vec!["web".to_string(), "worker".to_string()])
        .prefix("releases/{{_instance_}}/")
        .verbosity(2);

    let report = golden::run_silent(&config)?;
    println!("Instances deployed: {}", report.total_deployed());
    Ok(())
}

fn custom_output_example() -> golden::Result<()> {
    println!("\n=== Custom Output Handler Example ===");

    struct JsonOutputHandler;

    impl OutputHandler for JsonOutputHandler {
        fn on_resolve_start(&self, instance_count: usize) {
            println!(r#"{{"event": "resolve_start", "instances": {}}}"#, instance_count);
        }
        fn on_resolve_end(&self, instance_count: usize, unresolved_count: usize) {
            println!(
                r#"{{"event": "resolve_end", "instances": {}, "unresolved": {}}}"#,
                instance_count, unresolved_count
            );
        }
        fn on_pack_start(&self, host: &str, instance_count: usize) {
            println!(r#"{{"event": "pack_start", "host": "{}", "instances": {}}}"#, host, instance_count);
        }
        fn on_pack_end(&self, host: &str, files_packed: usize) {
            println!(r#"{{"event": "pack_end", "host": "{}", "files": {}}}"#, host, files_packed);
        }
        fn on_host_deploy_start(&self, host: &str) {
            println!(r#"{{"event": "host_deploy_start", "host": "{}"}}"#, host);
        }
        fn on_host_deploy_end(&self, host: &str, success: bool) {
            println!(r#"{{"event": "host_deploy_end", "host": "{}", "success": {}}}"#, host, success);
        }
        fn on_instance_result(&self, instance: &str, host: &str, success: bool) {
            println!(
                r#"{{"event": "instance_result", "instance": "{}", "host": "{}", "success": {}}}"#,
                instance, host, success
            );
        }
        fn on_report(&self, report: &golden::Report) {
            println!(r#"{{"event": "report", "deployed": {}, "failed": {}}}"#, report.total_deployed(), report.total_failed());
        }
        fn log(&self, level: LogLevel, message: &str) {
            let level_str = match level {
                LogLevel::Debug => "debug",
                LogLevel::Info => "info",
                LogLevel::Warning => "warning",
                LogLevel::Error => "error",
            };
            println!(r#"{{"event": "log", "level": "{}", "message": "{}"}}"#, level_str, message);
        }
    }

    let config = GoldenConfig::new().root_dir("./fleet").group("web1");
    let _ = golden::run(&config, Arc::new(JsonOutputHandler))?;
    let _ = Arc::new(NullOutputHandler); // silent variant available too
    Ok(())
}
