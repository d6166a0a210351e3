use clap::Subcommand;
use tikkr_core::{Database, TaskRecord};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task (the first task becomes active)
    Add {
        /// Task title
        title: String,
        /// Estimated pomodoros
        #[arg(long, default_value = "1")]
        estimate: u32,
    },
    /// List tasks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Focus a task; completed work sessions count toward it
    Activate {
        /// Task ID
        id: String,
    },
    /// Toggle the completed flag
    Toggle {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

fn describe(task: &TaskRecord) -> String {
    format!(
        "{} [{}] {} ({}/{})  {}",
        if task.is_active { "*" } else { " " },
        if task.is_completed { "x" } else { " " },
        task.title,
        task.completed_pomodoros,
        task.estimated_pomodoros,
        task.id,
    )
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Add { title, estimate } => {
            if title.trim().is_empty() {
                return Err("task title must not be empty".into());
            }
            let task = db.add_task(title.trim(), estimate)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { json } => {
            let tasks = db.tasks()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("no tasks");
            } else {
                for task in &tasks {
                    println!("{}", describe(task));
                }
            }
        }
        TaskAction::Activate { id } => {
            db.activate_task(&id)?;
            println!("active: {id}");
        }
        TaskAction::Toggle { id } => {
            let done = db.toggle_task(&id)?;
            println!("{id} completed: {done}");
        }
        TaskAction::Delete { id } => {
            db.delete_task(&id)?;
            println!("deleted: {id}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_marks_active_and_done() {
        let task = TaskRecord {
            id: "abc".into(),
            title: "Read paper".into(),
            estimated_pomodoros: 3,
            completed_pomodoros: 1,
            is_completed: true,
            is_active: true,
            created_at: "2026-01-01T00:00:00+00:00".into(),
        };
        assert_eq!(describe(&task), "* [x] Read paper (1/3)  abc");
    }
}
