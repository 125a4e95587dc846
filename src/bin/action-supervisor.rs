use std::thread;

use tracing::info;

use action_supervisor::cli::Cli;
use action_supervisor::config::loader::ConfigLoaderFile;
use action_supervisor::event::channel::pub_sub;
use action_supervisor::logging::Logging;
use action_supervisor::probe::http::HttpProber;
use action_supervisor::worker::process::ProcessChannelFactory;
use action_supervisor::Supervisor;

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    Logging::try_init()?;

    let cli = Cli::init();
    let config = ConfigLoaderFile::new(&cli.config_path()).load()?;

    info!(
        endpoint = %config.backend_endpoint,
        worker = %config.channel_name,
        port = config.channel_port,
        "starting the action server supervisor"
    );

    let (report_publisher, report_consumer) = pub_sub();
    let prober = HttpProber::try_new()?;
    let factory = ProcessChannelFactory::from(&config);

    let supervisor = Supervisor::new(config, prober, factory, report_publisher).start();
    supervisor.request_start();

    // The report stream ends when the loop does; the observer drains it until then.
    let observer = thread::spawn(move || {
        for report in report_consumer.as_ref().iter() {
            info!(
                state = %report.state,
                failures = report.failure_count,
                reachable = report.reachable,
                "supervisor state changed"
            );
        }
    });

    let (shutdown_publisher, shutdown_consumer) = pub_sub::<()>();
    ctrlc::set_handler(move || {
        let _ = shutdown_publisher.publish(());
    })?;

    let _ = shutdown_consumer.as_ref().recv();
    info!("shutdown signal received, stopping the supervisor");

    supervisor.shutdown();
    if observer.join().is_err() {
        tracing::error!("the state observer panicked");
    }

    info!("action server supervisor finished");
    Ok(())
}
