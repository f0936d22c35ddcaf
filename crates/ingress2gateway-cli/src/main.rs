use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use ingress2gateway::{
    annotations::{alb_annotation_docs, gce_annotation_docs, rules::AnnotationRule},
    pipeline::{self, ConversionOptions, convert_documents, reverse_documents},
    provider::Provider,
    validation::validate_document,
    yaml,
};
use snafu::{ResultExt, Snafu, ensure};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives, e.g.
/// `INGRESS2GATEWAY_LOG=ingress2gateway=debug`.
const LOG_ENV_VAR: &str = "INGRESS2GATEWAY_LOG";

/// Input path meaning "read from stdin".
const STDIN_PATH: &str = "-";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to read input from {path:?}"))]
    ReadInput { source: io::Error, path: PathBuf },

    #[snafu(display("failed to write output to {path:?}"))]
    WriteOutput { source: io::Error, path: PathBuf },

    #[snafu(display("failed to write to stdout"))]
    WriteStdout { source: io::Error },

    #[snafu(display("failed to convert Ingress resources"))]
    Convert { source: pipeline::Error },

    #[snafu(display("failed to convert Gateway API resources to an Ingress"))]
    Reverse { source: pipeline::Error },

    #[snafu(display("failed to serialize the converted resources"))]
    Serialize { source: yaml::Error },

    #[snafu(display("failed to parse input documents"))]
    ParseDocuments { source: yaml::Error },

    #[snafu(display("validation found {errors} error(s)"))]
    ValidationFailed { errors: usize },
}

#[derive(Debug, Parser)]
#[command(
    name = "ingress2gateway",
    author,
    version,
    about = "Convert Kubernetes Ingress resources to Gateway API resources"
)]
struct Cli {
    /// Only log warnings and errors, unless overridden by INGRESS2GATEWAY_LOG.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert Ingress resources to a Gateway and routes.
    Convert(ConvertArguments),

    /// Convert a Gateway and HTTPRoutes back to an Ingress.
    Reverse(ReverseArguments),

    /// Check Ingress, Gateway and HTTPRoute documents for structural problems.
    Validate(ValidateArguments),

    /// List the supported Gateway API implementations.
    Providers,

    /// Document the known cloud provider annotations.
    Annotations(AnnotationsArguments),
}

#[derive(Debug, Args)]
struct ConvertArguments {
    /// File containing Ingress resources, `-` reads from stdin.
    input: PathBuf,

    /// Write the resources to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Apply the defaults of this Gateway API implementation.
    #[arg(short, long)]
    provider: Option<Provider>,

    /// Convert HTTPRoutes to GRPCRoutes for gRPC backends.
    #[arg(long)]
    grpc: bool,

    /// Ignore nginx tcp-services and udp-services annotations.
    #[arg(long)]
    no_stream_services: bool,

    /// Skip validation of the input and the converted resources.
    #[arg(long)]
    no_validate: bool,
}

impl ConvertArguments {
    fn options(&self) -> ConversionOptions {
        ConversionOptions {
            provider: self.provider,
            detect_grpc: self.grpc,
            detect_stream_services: !self.no_stream_services,
            validate: !self.no_validate,
        }
    }
}

#[derive(Debug, Args)]
struct ReverseArguments {
    /// File containing a Gateway and HTTPRoutes, `-` reads from stdin.
    input: PathBuf,

    /// Write the Ingress to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ValidateArguments {
    /// File to validate, `-` reads from stdin.
    input: PathBuf,
}

#[derive(Debug, Args)]
struct AnnotationsArguments {
    /// Only show the annotations of this cloud provider.
    #[arg(value_enum)]
    cloud: Option<Cloud>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Cloud {
    Alb,
    Gce,
}

impl Cloud {
    fn title(self) -> &'static str {
        match self {
            Self::Alb => "AWS Load Balancer Controller",
            Self::Gce => "GKE Ingress",
        }
    }

    fn rules(self) -> &'static [AnnotationRule] {
        match self {
            Self::Alb => alb_annotation_docs(),
            Self::Gce => gce_annotation_docs(),
        }
    }
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    run(cli.command)
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Convert(arguments) => {
            let input = read_input(&arguments.input)?;
            let yaml = convert(&input, &arguments.options())?;
            write_output(arguments.output.as_deref(), &yaml)
        }
        Command::Reverse(arguments) => {
            let input = read_input(&arguments.input)?;
            let yaml = reverse(&input)?;
            write_output(arguments.output.as_deref(), &yaml)
        }
        Command::Validate(arguments) => {
            let input = read_input(&arguments.input)?;
            let summary = validate(&input)?;
            write_output(None, &summary.report)?;
            ensure!(
                summary.errors == 0,
                ValidationFailedSnafu {
                    errors: summary.errors
                }
            );
            Ok(())
        }
        Command::Providers => write_output(None, &list_providers()),
        Command::Annotations(arguments) => {
            write_output(None, &describe_annotations(arguments.cloud))
        }
    }
}

fn read_input(path: &Path) -> Result<String, Error> {
    if path == Path::new(STDIN_PATH) {
        io::read_to_string(io::stdin()).context(ReadInputSnafu { path })
    } else {
        fs::read_to_string(path).context(ReadInputSnafu { path })
    }
}

/// Writes `contents` to the file at `path`, or to stdout if there is none.
fn write_output(path: Option<&Path>, contents: &str) -> Result<(), Error> {
    match path {
        Some(path) => {
            fs::write(path, contents).context(WriteOutputSnafu { path })?;
            info!(path = %path.display(), "wrote output file");
            Ok(())
        }
        None => io::stdout()
            .lock()
            .write_all(contents.as_bytes())
            .context(WriteStdoutSnafu),
    }
}

fn convert(input: &str, options: &ConversionOptions) -> Result<String, Error> {
    let report = convert_documents(input, options).context(ConvertSnafu)?;

    for warning in &report.warnings {
        warn!("{warning}");
    }
    info!(
        ingresses = report.outputs.len(),
        warnings = report.warnings.len(),
        unsupported = report.unsupported.len(),
        "converted Ingress resources"
    );

    report.to_yaml().context(ConvertSnafu)
}

fn reverse(input: &str) -> Result<String, Error> {
    let ingress = reverse_documents(input).context(ReverseSnafu)?;
    yaml::to_document_string(&ingress).context(SerializeSnafu)
}

#[derive(Debug, Default)]
struct ValidationSummary {
    /// One line per issue, or per document without issues.
    report: String,
    errors: usize,
}

/// Validates every document of a known kind. Documents of other kinds are
/// skipped.
fn validate(input: &str) -> Result<ValidationSummary, Error> {
    let documents = yaml::parse_documents(input).context(ParseDocumentsSnafu)?;
    let mut summary = ValidationSummary::default();

    for (index, document) in documents.iter().enumerate() {
        let Some(result) = validate_document(document) else {
            continue;
        };

        let kind = yaml::document_kind(document);
        if result.errors.is_empty() && result.warnings.is_empty() {
            summary
                .report
                .push_str(&format!("document #{index} ({kind}): OK\n"));
            continue;
        }

        for issue in result.issues() {
            summary
                .report
                .push_str(&format!("document #{index} ({kind}): {issue}\n"));
        }
        summary.errors += result.errors.len();
    }

    Ok(summary)
}

fn list_providers() -> String {
    let header = format!(
        "{:<10}{:<26}{:<34}{:<6}{}\n",
        "ID", "NAME", "GATEWAY CLASS", "GRPC", "TCP"
    );

    Provider::all()
        .map(|provider| {
            let id = provider.to_string();
            let preset = provider.preset();
            format!(
                "{id:<10}{name:<26}{class:<34}{grpc:<6}{tcp}\n",
                name = preset.display_name,
                class = preset.gateway_class,
                grpc = yes_no(preset.supports_grpc),
                tcp = yes_no(preset.supports_tcp),
            )
        })
        .fold(header, |table, row| table + &row)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn describe_annotations(cloud: Option<Cloud>) -> String {
    let clouds = match cloud {
        Some(cloud) => vec![cloud],
        None => vec![Cloud::Alb, Cloud::Gce],
    };

    clouds
        .into_iter()
        .map(|cloud| {
            let rules: String = cloud
                .rules()
                .iter()
                .map(|rule| {
                    format!(
                        "  {key}\n    {description}\n    -> {equivalent}\n",
                        key = rule.key,
                        description = rule.description,
                        equivalent = rule.gateway_equivalent,
                    )
                })
                .collect();
            format!("{title}:\n{rules}\n", title = cloud.title())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use indoc::indoc;

    use super::*;

    const INGRESS: &str = indoc! {"
        apiVersion: networking.k8s.io/v1
        kind: Ingress
        metadata:
          name: shop
          namespace: web
        spec:
          rules:
            - host: shop.example.com
              http:
                paths:
                  - path: /
                    pathType: Prefix
                    backend:
                      service:
                        name: storefront
                        port:
                          number: 8080
    "};

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_convert_arguments() {
        let cli = Cli::try_parse_from([
            "ingress2gateway",
            "convert",
            "ingress.yaml",
            "--provider",
            "Kong",
            "--grpc",
            "--no-validate",
            "-q",
        ])
        .expect("arguments must parse");

        assert!(cli.quiet);
        let Command::Convert(arguments) = cli.command else {
            unreachable!("expected the convert command");
        };
        assert_eq!(
            arguments.options(),
            ConversionOptions {
                provider: Some(Provider::Kong),
                detect_grpc: true,
                detect_stream_services: true,
                validate: false,
            }
        );
    }

    #[test]
    fn reject_unknown_provider() {
        let result = Cli::try_parse_from([
            "ingress2gateway",
            "convert",
            "ingress.yaml",
            "--provider",
            "haproxy",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn convert_file_to_file() {
        let directory = tempfile::tempdir().expect("temporary directory must be created");
        let input = directory.path().join("ingress.yaml");
        let output = directory.path().join("gateway.yaml");
        fs::write(&input, INGRESS).expect("input must be written");

        let input_path = input.to_str().expect("path must be UTF-8");
        let output_path = output.to_str().expect("path must be UTF-8");
        let cli = Cli::try_parse_from([
            "ingress2gateway",
            "convert",
            input_path,
            "--output",
            output_path,
        ])
        .expect("arguments must parse");

        run(cli.command).expect("conversion must succeed");

        let written = fs::read_to_string(&output).expect("output must be readable");
        assert!(written.starts_with("---\n"));
        assert!(written.contains("kind: Gateway"));
        assert!(written.contains("kind: HTTPRoute"));
        assert!(written.contains("name: storefront"));
    }

    #[test]
    fn reverse_converted_resources() {
        let converted = convert(INGRESS, &ConversionOptions::default()).expect("must convert");
        let ingress = reverse(&converted).expect("must reverse");

        assert!(ingress.contains("kind: Ingress"));
        assert!(ingress.contains("host: shop.example.com"));
        assert!(ingress.contains("name: storefront"));
    }

    #[test]
    fn missing_input_file() {
        let error = read_input(Path::new("/nonexistent/ingress.yaml"))
            .expect_err("reading a missing file must fail");
        assert!(matches!(error, Error::ReadInput { .. }));
    }

    #[test]
    fn validate_reports_errors() {
        let input = indoc! {"
            apiVersion: networking.k8s.io/v1
            kind: Ingress
            metadata:
              name: broken
        "};

        let summary = validate(input).expect("input must parse");
        assert!(summary.errors > 0);
        assert!(summary.report.contains("document #0 (Ingress): [ERROR]"));
    }

    #[test]
    fn validate_accepts_valid_ingress() {
        let summary = validate(INGRESS).expect("input must parse");

        assert_eq!(summary.errors, 0);
        assert_eq!(summary.report, "document #0 (Ingress): OK\n");
    }

    #[test]
    fn providers_table_lists_every_provider() {
        let table = list_providers();

        assert_eq!(table.lines().count(), Provider::all().count() + 1);
        assert!(table.contains("gke-l7-global-external-managed"));
        assert!(table.contains("NGINX Gateway Fabric"));
    }

    #[test]
    fn annotations_for_single_cloud() {
        let text = describe_annotations(Some(Cloud::Alb));

        assert!(text.starts_with("AWS Load Balancer Controller:"));
        assert!(text.contains("alb.ingress.kubernetes.io/scheme"));
        assert!(!text.contains("GKE Ingress"));
    }
}
