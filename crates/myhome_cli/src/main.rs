//! Command-line front end for the MyHome incidence service.
//!
//! # Responsibility
//! - Load config, start logging and open the database.
//! - Map subcommands onto `IncidenceService` and the directory stores.
//! - Print results as JSON on stdout.

use clap::{Args, Parser, Subcommand};
use log::error;
use myhome_core::db::open_db;
use myhome_core::{
    init_logging, AppConfig, EmployeeRepository, FsPhotoManager, IncidencePriority,
    IncidenceRequest, IncidenceService, IncidenceStatus, NewEmployee, OrganizationRepository,
    PageRequest, PhotoUpload, SqliteEmployeeRepository, SqliteOrganizationRepository,
    StaticUserResolver, UserIdentity,
};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "myhome")]
#[command(about = "MyHome incidence management", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file; defaults to `<base>/config.toml`
    #[arg(short, long, env = "MYHOME_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check core linkage
    Ping,

    /// Manage organizations
    #[command(subcommand)]
    Org(OrgCommands),

    /// Manage employees
    #[command(subcommand)]
    Employee(EmployeeCommands),

    /// Manage incidences
    #[command(subcommand)]
    Incidence(IncidenceCommands),
}

#[derive(Subcommand)]
enum OrgCommands {
    /// Add an organization
    Add {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Subcommand)]
enum EmployeeCommands {
    /// Add an employee
    Add {
        #[arg(short, long)]
        first_name: String,

        #[arg(short, long)]
        last_name: String,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(short, long)]
        organization: Option<i64>,
    },
}

#[derive(Subcommand)]
enum IncidenceCommands {
    /// Create an incidence, attaching photo files
    Create {
        /// Pre-assigned id
        #[arg(long)]
        id: Option<i64>,

        #[command(flatten)]
        fields: IncidenceFields,

        /// Photo file to attach; repeatable
        #[arg(short, long = "photo", value_name = "PATH")]
        photos: Vec<PathBuf>,
    },

    /// Print the stored aggregate
    Get {
        #[arg(value_name = "INCIDENCE_ID")]
        id: i64,
    },

    /// Print the summary as seen by a caller
    Show {
        #[arg(value_name = "INCIDENCE_ID")]
        id: i64,

        /// Caller login; omitted means anonymous
        #[arg(long)]
        login: Option<String>,

        /// Caller authority; repeatable
        #[arg(short, long = "authority", value_name = "NAME", requires = "login")]
        authorities: Vec<String>,
    },

    /// Overwrite editable fields
    Update {
        #[arg(value_name = "INCIDENCE_ID")]
        id: i64,

        #[command(flatten)]
        fields: IncidenceFields,
    },

    /// Delete an incidence and its photos
    Delete {
        #[arg(value_name = "INCIDENCE_ID")]
        id: i64,
    },

    /// List incidence summaries
    List {
        #[arg(short, long, default_value = "0")]
        page: u32,

        #[arg(short = 's', long, default_value = "20")]
        page_size: u32,
    },
}

#[derive(Args)]
struct IncidenceFields {
    #[arg(short, long)]
    title: String,

    #[arg(short, long, default_value = "")]
    description: String,

    /// Epoch milliseconds
    #[arg(long)]
    start_date: Option<i64>,

    /// Epoch milliseconds
    #[arg(long)]
    end_date: Option<i64>,

    /// open | in_progress | resolved | closed
    #[arg(short = 'S', long, default_value = "open", value_parser = parse_status)]
    status: IncidenceStatus,

    /// low | medium | high | urgent
    #[arg(short = 'P', long, default_value = "medium", value_parser = parse_priority)]
    priority: IncidencePriority,

    #[arg(long, allow_negative_numbers = true)]
    longitude: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    latitude: Option<f64>,

    #[arg(long)]
    organization: Option<i64>,

    #[arg(long)]
    employee: Option<i64>,
}

impl IncidenceFields {
    fn into_request(self, id: Option<i64>) -> IncidenceRequest {
        IncidenceRequest {
            id,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            priority: self.priority,
            longitude: self.longitude,
            latitude: self.latitude,
            organization_id: self.organization,
            employee_id: self.employee,
            ..IncidenceRequest::new(self.title, self.description)
        }
    }
}

fn parse_status(value: &str) -> Result<IncidenceStatus, String> {
    IncidenceStatus::parse(value).ok_or_else(|| format!("unknown status `{value}`"))
}

fn parse_priority(value: &str) -> Result<IncidencePriority, String> {
    IncidencePriority::parse(value).ok_or_else(|| format!("unknown priority `{value}`"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    if let Commands::Ping = cli.command {
        println!("myhome_core ping={}", myhome_core::ping());
        println!("myhome_core version={}", myhome_core::core_version());
        return Ok(());
    }

    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
        config.validate()?;
    }
    init_logging(&config.log_level, &absolute(&config.log_dir)?, true)?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = open_db(&config.database_path)?;

    match cli.command {
        Commands::Ping => Ok(()),
        Commands::Org(OrgCommands::Add { name }) => {
            let organization = SqliteOrganizationRepository::try_new(&conn)?.create(&name)?;
            print_json(&organization)
        }
        Commands::Employee(EmployeeCommands::Add {
            first_name,
            last_name,
            email,
            organization,
        }) => {
            let employee = SqliteEmployeeRepository::try_new(&conn)?.create(&NewEmployee {
                organization_id: organization,
                first_name,
                last_name,
                email,
            })?;
            print_json(&employee)
        }
        Commands::Incidence(command) => {
            let users = match &command {
                IncidenceCommands::Show {
                    login: Some(login),
                    authorities,
                    ..
                } => StaticUserResolver::new(UserIdentity::new(login.as_str(), authorities)),
                _ => StaticUserResolver::anonymous(),
            };
            let service = IncidenceService::new(&conn, FsPhotoManager::new(&config.photo_dir), users)
                .with_link_policy(config.link_policy);
            run_incidence(&service, command)
        }
    }
}

fn run_incidence(
    service: &IncidenceService<'_, FsPhotoManager, StaticUserResolver>,
    command: IncidenceCommands,
) -> CliResult<()> {
    match command {
        IncidenceCommands::Create { id, fields, photos } => {
            let mut request = fields.into_request(id);
            request.photo_files = photos
                .iter()
                .map(PathBuf::as_path)
                .map(read_upload)
                .collect::<CliResult<Vec<_>>>()?;
            print_json(&service.create(&request)?)
        }
        IncidenceCommands::Get { id } => print_json(&service.get_by_id(id)?),
        IncidenceCommands::Show { id, .. } => print_json(&service.get_by_id_with_visibility(id)?),
        IncidenceCommands::Update { id, fields } => {
            print_json(&service.update(&fields.into_request(Some(id)))?)
        }
        IncidenceCommands::Delete { id } => {
            service.delete(id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        IncidenceCommands::List { page, page_size } => {
            print_json(&service.list_page(&PageRequest::new(page, page_size))?)
        }
    }
}

fn read_upload(path: &Path) -> CliResult<PhotoUpload> {
    let bytes = std::fs::read(path).map_err(|err| format!("{}: {err}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PhotoUpload::new(file_name, content_type_of(path), bytes))
}

fn content_type_of(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

fn absolute(path: &Path) -> CliResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
