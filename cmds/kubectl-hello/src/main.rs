use anyhow::Result;
use clap::{Parser, Subcommand};
use kubectl_hello::{commands, commands::util::BrokenPipeGuard, telemetry};
use tracing::Level;

#[derive(Parser)]
#[command(name = "kubectl-hello")]
#[command(about = "Say hello to Kubernetes resources", long_about = None)]
#[command(version = env!("KUBECTL_HELLO_VERSION"))]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Print a greeting for each resource named by files, a kustomization or TYPE[/NAME]
	HelloKubernetes(commands::hello_kubernetes::HelloKubernetesArgs),

	/// Print a greeting to the world
	HelloWorld(commands::hello_world::HelloWorldArgs),
}

fn log_level(cmd: &Commands) -> Option<Level> {
	match cmd {
		Commands::HelloKubernetes(args) => args.log_level,
		Commands::HelloWorld(args) => args.log_level,
	}
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	telemetry::init(log_level(&cli.command))?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::HelloKubernetes(args) => commands::hello_kubernetes::run(args, stdout),
		Commands::HelloWorld(args) => commands::hello_world::run(args, stdout),
	}
}
