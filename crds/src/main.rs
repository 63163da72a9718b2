use clap::{arg, Command, ValueEnum};
use crds::TransportIngress;
use kube::CustomResourceExt;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Crd {
    #[clap(alias = "transportingress", alias = "transportIngress")]
    TransportIngress,
}

fn cli() -> Command {
    Command::new("cluster-agent-crd")
        .about("Cluster agent command line interface for managing CRD's")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("print")
                .about("Print a CRD")
                .arg(
                    arg!(<CRD>)
                        .value_parser(clap::value_parser!(Crd))
                        .required(true),
                )
                .arg(
                    arg!(--output <FILE>)
                        .help("Write the manifest to a file instead of stdout")
                        .value_parser(clap::value_parser!(PathBuf))
                        .required(false),
                ),
        )
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("print", sub_matches)) => {
            let crd = match sub_matches.get_one::<Crd>("CRD") {
                Some(Crd::TransportIngress) | None => TransportIngress::crd(),
            };
            let manifest = match serde_yml::to_string(&crd) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("Unable to serialize CRD: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            match sub_matches.get_one::<PathBuf>("output") {
                Some(path) => {
                    if let Err(e) = std::fs::write(path, manifest) {
                        eprintln!("Unable to write {}: {}", path.display(), e);
                        return ExitCode::FAILURE;
                    }
                    println!("CRD written to {}", path.display());
                }
                None => println!("{}", manifest),
            }
            ExitCode::SUCCESS
        }
        _ => unreachable!(),
    }
}
