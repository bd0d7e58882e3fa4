use anyhow::Context;
use chrono::{Local, NaiveDate};
use tracing::{debug, info, instrument};

use crate::cli::{AddArgs, Command, ListArgs};
use crate::config::Config;
use crate::controller::TaskController;
use crate::filter::Filter;
use crate::render::Renderer;
use crate::seed;
use crate::task::TaskFormData;

/// Runs one command against a freshly loaded controller, then reports the
/// notices the controller raised along the way.
#[instrument(skip(controller, cfg, renderer, command))]
pub async fn dispatch(
    controller: &mut TaskController,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    controller.load().await;

    let today = Local::now().date_naive();
    let outcome = run_command(controller, cfg, renderer, command, today).await;

    renderer.print_notices(&controller.take_notices())?;
    outcome
}

async fn run_command(
    controller: &mut TaskController,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match command {
        Command::List(args) => cmd_list(controller, renderer, args, today),
        Command::Add(args) => {
            let form = form_from_args(cfg, args, today);
            let task = controller.add_task(form).await?;
            renderer.print_task_info(&task)
        }
        Command::Done { id } => {
            controller.set_task_completed(&id, true).await?;
            info!(id = %id, "task completed");
            Ok(())
        }
        Command::Undone { id } => {
            controller.set_task_completed(&id, false).await?;
            info!(id = %id, "task reopened");
            Ok(())
        }
        Command::Edit(args) => {
            let (id, patch) = args.into_patch();
            if patch.is_empty() {
                anyhow::bail!("nothing to change; pass at least one of --title, --description, --due, --category");
            }
            let task = controller.edit_task(&id, patch).await?;
            renderer.print_task_info(&task)
        }
        Command::Delete { id } => {
            controller.delete_task(&id).await?;
            Ok(())
        }
        Command::SeedDemo => cmd_seed_demo(controller, today).await,
        Command::Categories => renderer.print_categories(),
    }
}

fn cmd_list(
    controller: &TaskController,
    renderer: &mut Renderer,
    args: ListArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let all = controller.list_tasks();
    let filter = Filter::new(&args.query, args.category);
    let visible = filter.apply(&all);
    debug!(total = all.len(), visible = visible.len(), "rendering task list");

    if args.json {
        return renderer.print_task_json(&visible);
    }
    renderer.print_task_table(&visible, today)?;
    renderer.print_filter_summary(&filter, visible.len(), all.len())
}

async fn cmd_seed_demo(controller: &mut TaskController, today: NaiveDate) -> anyhow::Result<()> {
    for demo in seed::demo_tasks(today) {
        let task = controller
            .add_task(demo.form)
            .await
            .context("failed to create demo task")?;
        if demo.completed {
            controller.set_task_completed(&task.id, true).await?;
        }
    }
    info!("demo tasks created");
    Ok(())
}

fn form_from_args(cfg: &Config, args: AddArgs, today: NaiveDate) -> TaskFormData {
    let mut form = TaskFormData::new(args.title, args.due.unwrap_or(today))
        .with_category(args.category.unwrap_or_else(|| cfg.default_category()));
    if let Some(description) = args.description {
        form = form.with_description(description);
    }
    form
}
