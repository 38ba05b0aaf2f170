use std::fmt::Write as _;

use crate::core::formatter::{format_bytes, format_duration};
use crate::core::job::{Direction, JobResult, JobSettings, MaxBits};
use crate::core::stats::StatsReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Warning(String),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct PanelView {
    pub settings: JobSettings,
    pub notice: Option<Notice>,
    pub result: Option<JobResult>,
    pub artifact_size: Option<u64>,
    pub stats: Option<StatsReport>,
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn render_panel(view: &PanelView) -> String {
    let mut body = String::new();
    body.push_str("<h1>File compression and decompression</h1>\n");

    if let Some(notice) = &view.notice {
        let (class, text) = match notice {
            Notice::Success(text) => ("success", text),
            Notice::Warning(text) => ("warning", text),
            Notice::Error(text) => ("error", text),
        };
        let _ = writeln!(body, "<div class=\"notice {class}\">{}</div>", escape_html(text));
    }

    render_form(&mut body, &view.settings);

    if let Some(result) = &view.result {
        render_result(&mut body, result, view.artifact_size, view.stats.as_ref());
    }

    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>lzwflow</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn render_form(body: &mut String, settings: &JobSettings) {
    let selected = |direction: Direction| {
        if settings.direction == direction {
            " selected"
        } else {
            ""
        }
    };
    let checked = |on: bool| if on { " checked" } else { "" };

    let _ = write!(
        body,
        "<form method=\"post\" action=\"/jobs\" enctype=\"multipart/form-data\">\n\
         <label>Operation\n<select name=\"direction\">\n\
         <option value=\"compress\"{}>Compress</option>\n\
         <option value=\"decompress\"{}>Decompress</option>\n\
         </select></label>\n\
         <label>File <input type=\"file\" name=\"file\"></label>\n\
         <label>Maximum bits (--max-bits) <output id=\"bits\">{bits}</output>\n\
         <input type=\"range\" name=\"max_bits\" min=\"{min}\" max=\"{max}\" value=\"{bits}\" \
         oninput=\"document.getElementById('bits').value=this.value\"></label>\n\
         <label><input type=\"checkbox\" name=\"fixed\"{}> --fixed (fixed-size table)</label>\n\
         <label><input type=\"checkbox\" name=\"stats\"{}> --stats (show statistics)</label>\n\
         <button type=\"submit\">Run</button>\n</form>\n",
        selected(Direction::Compress),
        selected(Direction::Decompress),
        checked(settings.fixed_table),
        checked(settings.collect_stats),
        bits = settings.max_bits,
        min = MaxBits::MIN,
        max = MaxBits::MAX,
    );
}

fn render_result(body: &mut String, result: &JobResult, artifact_size: Option<u64>, stats: Option<&StatsReport>) {
    let _ = writeln!(
        body,
        "<section class=\"result\">\n<h2>Last job: {} {}</h2>\n<p>Finished in {}.</p>",
        result.direction,
        escape_html(&result.original_filename),
        format_duration(result.elapsed)
    );

    if result.succeeded {
        if let Some(name) = result.artifact_name() {
            match artifact_size {
                Some(size) => {
                    let _ = writeln!(
                        body,
                        "<p><a class=\"download\" href=\"/result/artifact\" download=\"{name}\">Download {name}</a> ({})</p>",
                        format_bytes(size),
                        name = escape_html(&name)
                    );
                }
                None => {
                    let _ = writeln!(
                        body,
                        "<p class=\"warning\">The engine reported success but {} was not produced.</p>",
                        escape_html(&name)
                    );
                }
            }
        }
        if let Some(report) = stats {
            body.push_str("<h3>Statistics</h3>\n");
            if !report.fields.is_empty() {
                body.push_str("<table>\n");
                for field in &report.fields {
                    let _ = writeln!(
                        body,
                        "<tr><th>{}</th><td>{}</td></tr>",
                        escape_html(&field.key),
                        escape_html(&field.value)
                    );
                }
                body.push_str("</table>\n");
            }
            let _ = writeln!(body, "<pre class=\"stats\">{}</pre>", escape_html(&report.text()));
        }
    } else if let Some(error) = &result.error_output {
        let _ = writeln!(body, "<pre class=\"error\">{}</pre>", escape_html(error));
    }

    body.push_str("</section>\n");
}

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
label{display:block;margin:.6rem 0}\
.notice{padding:.6rem;border-radius:4px;margin:1rem 0}\
.success{background:#e6f4ea}.warning{background:#fff4e5}.error{background:#fdecea}\
pre{white-space:pre-wrap;padding:.6rem;background:#f6f6f6}\
th{text-align:left;padding-right:1rem}";

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::core::job::Job;
    use crate::core::stats::parse_stats_text;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn default_form_has_twelve_bits_and_unchecked_boxes() {
        let html = render_panel(&PanelView::default());
        assert!(html.contains("value=\"12\""));
        assert!(html.contains("min=\"9\" max=\"16\""));
        assert!(!html.contains(" checked"));
        assert!(html.contains("<option value=\"compress\" selected>"));
    }

    #[test]
    fn success_offers_download_and_stats_lines() {
        let job = Job::new("report.txt", JobSettings::default()).expect("job");
        let view = PanelView {
            result: Some(JobResult::success(
                &job,
                PathBuf::from("outputs/report.txt.lzw"),
                Some(PathBuf::from("stats/report.txt.stats")),
                Duration::from_millis(12),
            )),
            artifact_size: Some(40),
            stats: Some(parse_stats_text("Ratio: 0.4\nsecond line")),
            ..PanelView::default()
        };
        let html = render_panel(&view);
        assert!(html.contains("href=\"/result/artifact\" download=\"report.txt.lzw\""));
        assert!(html.contains("<pre class=\"stats\">Ratio: 0.4\nsecond line</pre>"));
        assert!(html.contains("<th>Ratio</th><td>0.4</td>"));
    }

    #[test]
    fn failure_shows_escaped_error() {
        let job = Job::new("report.txt", JobSettings::default()).expect("job");
        let view = PanelView {
            result: Some(JobResult::failure(&job, "bad <table>", Duration::ZERO)),
            ..PanelView::default()
        };
        let html = render_panel(&view);
        assert!(html.contains("<pre class=\"error\">bad &lt;table&gt;</pre>"));
        assert!(!html.contains("/result/artifact"));
    }
}
