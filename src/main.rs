use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use taskdesk::{
    change_password_request::ChangePasswordRequest,
    create_task_request::CreateTaskRequest,
    error::FieldErrors,
    settings::Settings,
    shell::Route,
    signup_request::SignupRequest,
    task::Task,
    task_filters::TaskFilters,
    task_priority::TaskPriority,
    task_status::TaskStatus,
    update_task_request::UpdateTaskRequest,
    ClientContext, ClientError,
};

#[derive(Parser)]
#[command(name = "taskdesk", version, about = "Personal task manager client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and log in
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List tasks
    Tasks {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// e.g. `-created_at`, `priority`, `due_date`
        #[arg(long)]
        ordering: Option<String>,
    },
    Stats,
    /// Show one task
    Show { id: i64 },
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        status: Option<TaskStatus>,
        /// RFC 3339, e.g. 2026-11-01T17:00:00Z
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    Delete { id: i64 },
    /// Apply one status/priority change to several tasks
    BulkUpdate {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    ChangePassword {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
}

impl Command {
    /// The view this command stands in for. `logout` and `whoami` work
    /// with or without a session.
    fn route(&self) -> Option<Route> {
        let route = match self {
            Command::Logout | Command::Whoami => return None,
            Command::Login { .. } => Route::Login,
            Command::Signup { .. } => Route::Signup,
            Command::Create { .. } => Route::NewTask,
            Command::Show { id } | Command::Update { id, .. } | Command::Delete { id } => {
                Route::TaskDetail(*id)
            }
            _ => Route::Dashboard,
        };
        Some(route)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // ── Logging ────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskdesk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ── Boot ───────────────────────────────────────────────────
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "failed to load settings");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(api = %settings.api_base_url, "settings loaded");

    let ctx = match ClientContext::open(settings) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = %e, "failed to open client");
            return ExitCode::FAILURE;
        }
    };
    ctx.session.hydrate().await;

    // ── Dispatch ───────────────────────────────────────────────
    let authenticated = ctx.session.is_authenticated();
    let turned_away = cli.command.route().is_some_and(|wanted| {
        wanted != Route::Login && wanted.resolve(authenticated) == Route::Login
    });
    if turned_away {
        eprintln!("Not logged in. Run `taskdesk login --email <email> --password <password>`.");
        return ExitCode::FAILURE;
    }

    match run(&ctx, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e.message());
            ExitCode::FAILURE
        }
    }
}

async fn run(ctx: &ClientContext, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Login { email, password } => {
            let user = ctx.session.login(&email, &password).await?;
            println!("Logged in as {} <{}>", user.display_name(), user.email);
        }
        Command::Signup {
            username,
            email,
            first_name,
            last_name,
            password,
            confirm,
        } => {
            let request = SignupRequest {
                username,
                email,
                first_name,
                last_name,
                password,
                password_confirm: confirm,
            };
            if !request.passwords_match() {
                return Err(local_validation("password_confirm", "Passwords do not match."));
            }
            let user = ctx.session.signup(&request).await?;
            println!("Welcome, {}", user.display_name());
        }
        Command::Logout => {
            ctx.session.logout().await;
            println!("Logged out");
        }
        Command::Whoami => match ctx.session.current_user() {
            Some(user) => println!("{} <{}> (id {})", user.display_name(), user.email, user.id),
            None => println!("anonymous"),
        },
        Command::Tasks {
            status,
            priority,
            search,
            ordering,
        } => {
            let filters = TaskFilters {
                status,
                priority,
                search,
                ordering,
            };
            let page = ctx.guard(ctx.tasks.list_tasks(&filters).await)?;
            if page.is_empty() {
                println!("No tasks");
            }
            let now = Utc::now();
            for task in &page.results {
                println!("{}", summary_line(task, now));
            }
            if page.has_more() {
                println!("... {} tasks in total", page.count);
            }
        }
        Command::Stats => {
            let stats = ctx.guard(ctx.tasks.get_stats().await)?;
            println!("total        {}", stats.total_tasks);
            println!("to do        {}", stats.todo_tasks);
            println!("in progress  {}", stats.in_progress_tasks);
            println!("done         {}", stats.done_tasks);
            println!("overdue      {}", stats.overdue_tasks);
        }
        Command::Show { id } => {
            let task = ctx.guard(ctx.tasks.get_task(id).await)?;
            print_task(&task);
        }
        Command::Create {
            title,
            description,
            priority,
            status,
            due,
        } => {
            let request = CreateTaskRequest {
                title,
                description,
                priority,
                status,
                due_date: due,
            };
            let task = ctx.guard(ctx.tasks.create_task(&request).await)?;
            println!("Created #{}", task.id);
        }
        Command::Update {
            id,
            title,
            description,
            priority,
            status,
            due,
        } => {
            let request = UpdateTaskRequest {
                title,
                description,
                priority,
                status,
                due_date: due,
            };
            if request.is_empty() {
                return Err(local_validation("non_field_errors", "Nothing to update."));
            }
            let task = ctx.guard(ctx.tasks.update_task(id, &request).await)?;
            print_task(&task);
        }
        Command::Delete { id } => {
            ctx.guard(ctx.tasks.delete_task(id).await)?;
            println!("Deleted #{id}");
        }
        Command::BulkUpdate { ids, priority, status } => {
            let updates = UpdateTaskRequest {
                priority,
                status,
                ..Default::default()
            };
            if updates.is_empty() {
                return Err(local_validation("non_field_errors", "Give --status or --priority."));
            }
            let response = ctx.guard(ctx.tasks.bulk_update(&ids, &updates).await)?;
            println!("Updated {} tasks", response.updated_count);
        }
        Command::ChangePassword { old, new, confirm } => {
            let request = ChangePasswordRequest {
                old_password: old,
                new_password: new,
                new_password_confirm: confirm,
            };
            ctx.guard(ctx.session.change_password(&request).await)?;
            println!("Password changed");
        }
    }
    Ok(())
}

fn local_validation(field: &str, message: &str) -> ClientError {
    let mut fields = FieldErrors::new();
    fields.insert(field.to_string(), vec![message.to_string()]);
    ClientError::Validation {
        message: message.to_string(),
        fields,
    }
}

fn summary_line(task: &Task, now: DateTime<Utc>) -> String {
    let flag = if task.status.is_open() && task.is_overdue(now) {
        "  (overdue)"
    } else if task.status.is_open() && task.is_due_soon(now) {
        "  (due soon)"
    } else {
        ""
    };
    format!(
        "#{:<5} {:<12} {:<7} {}{}",
        task.id,
        task.status.label(),
        task.priority.label(),
        task.title,
        flag
    )
}

fn print_task(task: &Task) {
    println!("#{} {}", task.id, task.title);
    println!("  status    {}", task.status.label());
    println!("  priority  {}", task.priority.label());
    if let Some(due) = task.due_date {
        println!("  due       {}", due.format("%Y-%m-%d %H:%M"));
    }
    if let Some(done) = task.completed_at {
        println!("  done at   {}", done.format("%Y-%m-%d %H:%M"));
    }
    if !task.description.is_empty() {
        println!();
        println!("{}", task.description);
    }
}
