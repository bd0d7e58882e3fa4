use chrono::{Days, NaiveDate};

use crate::task::{Category, TaskFormData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoTask {
    pub form: TaskFormData,
    pub completed: bool,
}

/// Example tasks for a fresh installation, dated around `today`.
///
/// Stores never insert these on their own; a caller has to create them
/// explicitly (the CLI does so in `seed-demo`).
pub fn demo_tasks(today: NaiveDate) -> Vec<DemoTask> {
    let shift = |days: u64, forward: bool| {
        let moved = if forward {
            today.checked_add_days(Days::new(days))
        } else {
            today.checked_sub_days(Days::new(days))
        };
        moved.unwrap_or(today)
    };

    vec![
        DemoTask {
            form: TaskFormData::new("Complete React project", shift(4, true))
                .with_description("Finish implementing the Task Mate application")
                .with_category(Category::Work),
            completed: false,
        },
        DemoTask {
            form: TaskFormData::new("Go grocery shopping", shift(1, false))
                .with_description("Buy fruits, vegetables, and milk")
                .with_category(Category::Shopping),
            completed: true,
        },
        DemoTask {
            form: TaskFormData::new("Gym workout", today)
                .with_description("Complete 30 minutes of cardio and strength training")
                .with_category(Category::Personal),
            completed: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_tasks_are_valid_and_dated_around_today() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 14).unwrap();
        let demo = demo_tasks(today);

        assert_eq!(demo.len(), 3);
        assert!(demo.iter().all(|task| task.form.validate().is_ok()));
        assert_eq!(demo[0].form.due_date, NaiveDate::from_ymd_opt(2025, 4, 18).unwrap());
        assert_eq!(demo[1].form.due_date, NaiveDate::from_ymd_opt(2025, 4, 13).unwrap());
        assert!(demo[1].completed);
    }
}
