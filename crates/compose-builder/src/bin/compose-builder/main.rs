mod cli;

use compose_builder::Project;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env(
            "COMPOSE_BUILDER_LOG",
        ))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Render(render_cli) => render(render_cli),
        cli::Command::Import(import_cli) => import(import_cli),
        cli::Command::Validate(validate_cli) => validate(validate_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn render(cli: cli::RenderCommand) -> anyhow::Result<()> {
    let project = load_project(&cli.input)?;

    if cli.validate {
        project.validate()?;
    }

    if cli.tree {
        serde_json::to_writer_pretty(std::io::stdout(), &project.document())?;
        println!();
    } else {
        println!("{}", project.render());
    }

    Ok(())
}

pub fn import(cli: cli::ImportCommand) -> anyhow::Result<()> {
    let text = read_input(&cli.input)?;
    let imported = compose_builder::import_str(&text)?;

    let project = Project {
        services: imported.services,
        networks: imported.networks,
        volumes: imported.volumes,
        ..Default::default()
    };

    match cli.output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &project)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), &project)?;
            println!();
        }
    };

    Ok(())
}

pub fn validate(cli: cli::ValidateCommand) -> anyhow::Result<()> {
    let project = load_project(&cli.input)?;

    for warning in project.vpn_warnings() {
        eprintln!("warning: {warning}");
    }

    if let Err(report) = project.validate() {
        for issue in report.issues() {
            eprintln!("{issue}");
        }
        anyhow::bail!("{} validation issue(s)", report.issues().len());
    }

    Ok(())
}

fn load_project(input: &cli::InputArgs) -> anyhow::Result<Project> {
    let text = read_input(input)?;
    let project = serde_json::from_str(&text)?;
    Ok(project)
}

fn read_input(input: &cli::InputArgs) -> anyhow::Result<String> {
    use anyhow::Context;

    match &input.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => Ok(std::io::read_to_string(std::io::stdin())?),
    }
}
