use std::{fs, io::Write, path::Path};

pub fn format_markdown_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = String::new();
    table.push_str("| ");
    table.push_str(&headers.join(" | "));
    table.push_str(" |\n| ");
    table.push_str(&headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | "));
    table.push_str(" |\n");
    for row in rows {
        table.push_str("| ");
        table.push_str(&row.join(" | "));
        table.push_str(" |\n");
    }
    table
}

/// Replace the `section` block of the results file, appending it if absent.
pub fn update_results(section: &str, content: &str) -> std::io::Result<()> {
    let section_upper = section.to_uppercase();
    let start_marker = format!("<!-- {section_upper}_START -->");
    let end_marker = format!("<!-- {section_upper}_END -->");

    let path = Path::new("crates/attention/benchmarks/RESULTS.md");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut body = if path.exists() {
        fs::read_to_string(path)?
    } else {
        "# Reference kernel throughput\n\n".to_string()
    };

    let block = format!("{start_marker}\n{content}\n{end_marker}\n");
    match (body.find(&start_marker), body.find(&end_marker)) {
        (Some(start), Some(end)) => {
            let end_bound = (end + end_marker.len() + 1).min(body.len());
            body.replace_range(start..end_bound, &block);
        }
        _ => {
            if !body.ends_with('\n') {
                body.push('\n');
            }
            body.push_str(&block);
        }
    }

    fs::File::create(path)?.write_all(body.as_bytes())
}
