use axum::response::Html;
use tera::{Context, Tera};

use crate::web::error::AppError;

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("dashboard.html", include_str!("../../templates/dashboard.html")),
    ("manage.html", include_str!("../../templates/manage.html")),
];

/// Builds the template set compiled into the binary. Names end in `.html`, so autoescaping is on.
pub fn load_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES)?;
    Ok(tera)
}

pub fn render(tera: &Tera, name: &str, context: &Context) -> Result<Html<String>, AppError> {
    Ok(Html(tera.render(name, context)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Table;
    use crate::server::config::MonitorConfig;
    use crate::services::monitor_service::{histogram, numeric_columns, summarize};
    use crate::services::record_service::search;
    use crate::web::routes::TableView;
    use serde_json::json;

    #[test]
    fn test_templates_compile() {
        let tera = load_templates().unwrap();
        assert!(tera.get_template_names().any(|n| n == "manage.html"));
    }

    #[test]
    fn test_login_page_escapes_error() {
        let tera = load_templates().unwrap();
        let mut context = Context::new();
        context.insert("user", &None::<String>);
        context.insert("error", "<script>");
        let html = render(&tera, "login.html", &context).unwrap().0;
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_dashboard_renders_distribution_of_selected_column() {
        let tera = load_templates().unwrap();
        let table = Table::new(
            vec!["id".into(), "priority".into()],
            vec![vec![json!(1), json!(2)], vec![json!(2), json!(4)]],
        );
        let mut context = Context::new();
        context.insert("user", &None::<String>);
        context.insert("table_name", "sources");
        context.insert("error", &None::<String>);
        context.insert("summary", &summarize(&table, &MonitorConfig::default()));
        context.insert("numeric_columns", &numeric_columns(&table));
        context.insert("histogram_column", "priority");
        context.insert("histogram", &histogram(&table, "priority", 2));
        context.insert("preview", &TableView::from(&table));

        let html = render(&tera, "dashboard.html", &context).unwrap().0;
        assert!(html.contains(r#"<option value="priority" selected>"#));
        assert!(html.contains("Distribution of priority"));
        assert!(html.contains("2 to 3"));
        assert!(html.contains("3 to 4"));
    }

    #[test]
    fn test_manage_view_shows_filtered_and_total_counts() {
        let tera = load_templates().unwrap();
        let table = Table::new(
            vec!["id".into(), "url".into()],
            vec![
                vec![json!(1), json!("https://news.example")],
                vec![json!(2), json!("https://shop.example")],
                vec![json!(3), json!("https://news2.example")],
            ],
        );
        let filtered = search(&table, Some("url"), "news");
        let mut context = Context::new();
        context.insert("user", &None::<String>);
        context.insert("tab", "view");
        context.insert("table_name", "sources");
        context.insert("notice", &None::<String>);
        context.insert("error", &None::<String>);
        context.insert("search_columns", &["All", "id", "url"]);
        context.insert("search_column", "url");
        context.insert("q", "news");
        context.insert("records", &TableView::from(&filtered));
        context.insert("total_records", &table.len());

        let html = render(&tera, "manage.html", &context).unwrap().0;
        assert!(html.contains("Showing 2 of 3 records"));
    }
}
