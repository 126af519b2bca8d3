use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::scanner::ImageRecord;

/// Structured output formats for `--passthru`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Writes records as pretty JSON or CSV.
pub fn write_records<W: Write>(
    records: &[ImageRecord],
    format: ExportFormat,
    mut writer: W,
) -> Result<()> {
    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, records)?;
            writeln!(writer)?;
        }
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(writer);
            wtr.write_record(["path", "short_description", "keywords", "people"])?;
            for record in records {
                let short = record
                    .description
                    .as_ref()
                    .and_then(|d| d.short_description.as_deref())
                    .unwrap_or("");
                wtr.write_record([
                    record.path.to_string_lossy().as_ref(),
                    short,
                    &record.keywords.join("; "),
                    &record.face_names().join("; "),
                ])?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}

/// Writes the HTML gallery for `records` to `output_path`.
pub fn write_gallery(records: &[ImageRecord], title: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(output_path)?;
    file.write_all(render_gallery(records, title).as_bytes())?;
    Ok(())
}

pub fn render_gallery(records: &[ImageRecord], title: &str) -> String {
    let mut html = String::new();

    // HTML header
    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0 auto;
            padding: 20px;
            background: #1a1a1a;
            color: #e0e0e0;
        }}
        h1 {{
            color: #4fc3f7;
            border-bottom: 2px solid #4fc3f7;
            padding-bottom: 10px;
        }}
        .stats {{
            background: #2d2d2d;
            padding: 15px;
            border-radius: 8px;
            margin-bottom: 20px;
        }}
        .photo-grid {{
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(300px, 1fr));
            gap: 20px;
        }}
        .photo-card {{
            background: #2d2d2d;
            border-radius: 8px;
            padding: 15px;
            border: 1px solid #404040;
        }}
        .photo-card img {{
            width: 100%;
            border-radius: 4px;
        }}
        .photo-card h3 {{
            color: #81c784;
            margin: 10px 0;
            font-size: 14px;
            word-break: break-all;
        }}
        .photo-card .description {{
            font-style: italic;
            color: #b0b0b0;
        }}
        .chip {{
            display: inline-block;
            background: #404040;
            border-radius: 10px;
            padding: 2px 8px;
            margin: 2px;
            font-size: 12px;
        }}
        .chip.person {{
            background: #1e4d6b;
        }}
    </style>
</head>
<body>
    <h1>{}</h1>
"#,
        html_escape(title),
        html_escape(title)
    ));

    // Stats section
    html.push_str(&format!(
        r#"    <div class="stats">
        <strong>Images:</strong> {}
    </div>
"#,
        records.len()
    ));

    html.push_str(r#"    <div class="photo-grid">
"#);

    for record in records {
        let path = record.path.to_string_lossy();
        let filename = record
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());

        html.push_str(r#"        <div class="photo-card">
"#);
        html.push_str(&format!(
            r#"            <a href="{url}"><img src="{url}" alt="{alt}" loading="lazy"></a>
            <h3 title="{title}">{name}</h3>
"#,
            url = html_escape(&file_url(&record.path)),
            alt = html_escape(&filename),
            title = html_escape(&path),
            name = html_escape(&filename),
        ));

        if let Some(text) = record
            .description
            .as_ref()
            .and_then(|d| d.long_description.as_deref().or(d.short_description.as_deref()))
        {
            html.push_str(&format!(
                r#"            <div class="description">{}</div>
"#,
                html_escape(text)
            ));
        }

        if !record.keywords.is_empty() || !record.face_names().is_empty() {
            html.push_str(r#"            <div>"#);
            for keyword in &record.keywords {
                html.push_str(&format!(r#"<span class="chip">{}</span>"#, html_escape(keyword)));
            }
            for name in record.face_names() {
                html.push_str(&format!(
                    r#"<span class="chip person">{}</span>"#,
                    html_escape(name)
                ));
            }
            html.push_str("</div>\n");
        }

        html.push_str(r#"        </div>
"#);
    }

    html.push_str(r#"    </div>
</body>
</html>
"#);

    html
}

/// Open a file with the configured browser or the system default opener
pub fn open_in_browser(path: &Path, browser: Option<&str>) -> Result<()> {
    let mut command = match browser {
        Some(browser) => {
            let mut c = std::process::Command::new(browser);
            c.arg(path);
            c
        }
        None => system_opener(path),
    };

    command
        .spawn()
        .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;

    Ok(())
}

#[cfg(target_os = "windows")]
fn system_opener(path: &Path) -> std::process::Command {
    let mut c = std::process::Command::new("cmd");
    c.args(["/C", "start", ""]).arg(path);
    c
}

#[cfg(target_os = "macos")]
fn system_opener(path: &Path) -> std::process::Command {
    let mut c = std::process::Command::new("open");
    c.arg(path);
    c
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn system_opener(path: &Path) -> std::process::Command {
    let mut c = std::process::Command::new("xdg-open");
    c.arg(path);
    c
}

/// `file://` URL for a local path, with the characters browsers trip over escaped.
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut url = String::from(if raw.starts_with('/') { "file://" } else { "file:///" });
    for c in raw.chars() {
        match c {
            ' ' => url.push_str("%20"),
            '#' => url.push_str("%23"),
            '%' => url.push_str("%25"),
            '?' => url.push_str("%3F"),
            _ => url.push(c),
        }
    }
    url
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
