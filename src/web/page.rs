use std::fmt::Write;

use uuid::Uuid;

use super::sessions::{Flash, FlashLevel, WebSession};

const STYLE: &str = r#"
body { font-family: sans-serif; background: #fdf6e3; color: #000; max-width: 60rem; margin: 2rem auto; }
form { margin: 0.5rem 0; }
.flash { padding: 0.6rem; border-radius: 6px; margin: 0.4rem 0; }
.flash.info { background: #e8f5e9; }
.flash.warning { background: #fff9c4; }
.flash.error { background: #ffcdd2; }
.question-box { background: #fff9c4; border-left: 5px solid #fbc02d; padding: 10px; margin: 5px 0; border-radius: 8px; }
.answer-box { background: #bbdefb; border-left: 5px solid #1976d2; padding: 10px; margin: 5px 0 15px 0; border-radius: 8px; white-space: pre-wrap; }
#progress { font-weight: bold; }
"#;

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn flash_class(level: FlashLevel) -> &'static str {
    match level {
        FlashLevel::Info => "info",
        FlashLevel::Warning => "warning",
        FlashLevel::Error => "error",
    }
}

/// Render the whole page for one session
pub fn render_session(id: &Uuid, web: &WebSession, flashes: &[Flash]) -> String {
    let mut html = String::new();
    let base = format!("/s/{}", id);

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>QA with Documents</title>\
         <style>{}</style></head><body>\n<h1>QA with Documents</h1>\n\
         <p>Upload a PDF or text document, then ask as many questions as you like without re-uploading.</p>\n",
        STYLE
    );

    for flash in flashes {
        let _ = writeln!(
            html,
            "<div class=\"flash {}\">{}</div>",
            flash_class(flash.level),
            escape_html(&flash.message)
        );
    }

    // Upload
    let _ = write!(
        html,
        "<h2>Document</h2>\n<form method=\"post\" action=\"{base}/upload\" enctype=\"multipart/form-data\" onsubmit=\"showProgress()\">\
         <input type=\"file\" name=\"file\" accept=\".pdf,.txt,application/pdf,text/plain\"> \
         <button type=\"submit\">Upload</button></form>\n",
        base = base
    );
    match (web.session.document(), &web.upload) {
        (Some(document), _) => {
            let _ = writeln!(
                html,
                "<p>Answering from <b>{}</b>.</p>",
                escape_html(&document.file_name)
            );
        }
        (None, Some(upload)) => {
            let _ = writeln!(
                html,
                "<p>Uploaded <b>{}</b>; it will be indexed on the first question.</p>",
                escape_html(&upload.file_name)
            );
        }
        (None, None) => html.push_str("<p>No document uploaded yet.</p>\n"),
    }

    // Questions
    html.push_str("<h2>Questions</h2>\n");
    for (i, question) in web.session.questions().iter().enumerate() {
        let _ = write!(
            html,
            "<form id=\"q{i}\" method=\"post\" action=\"{base}/questions/{i}\" onsubmit=\"showProgress()\">\
             <label>Question {n} <input type=\"text\" name=\"question\" size=\"60\" value=\"{value}\"></label> \
             <button type=\"submit\">Submit Question {n}</button></form>\n",
            i = i,
            n = i + 1,
            base = base,
            value = escape_html(question)
        );
    }
    let _ = write!(
        html,
        "<form method=\"post\" action=\"{base}/questions\"><button type=\"submit\">Add New Question</button></form>\n\
         <p id=\"progress\" hidden>Processing...</p>\n",
        base = base
    );

    // Results
    let pairs = web.session.render();
    if !pairs.is_empty() {
        html.push_str("<h2>Answers</h2>\n");
        for pair in pairs {
            let _ = write!(
                html,
                "<div class=\"question-box\">Q{}: {}</div>\n<div class=\"answer-box\">{}</div>\n",
                pair.index + 1,
                escape_html(pair.question),
                escape_html(pair.answer)
            );
        }
    }

    let _ = write!(
        html,
        "<hr><form method=\"post\" action=\"{base}/close\"><button type=\"submit\">End session</button></form>\n\
         <script>function showProgress() {{ document.getElementById('progress').hidden = false; }}</script>\n\
         </body></html>\n",
        base = base
    );

    html
}

/// Page shown for unknown or expired session links
pub fn render_not_found() -> String {
    "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Session not found</title></head>\
     <body><h1>Session not found</h1><p>This session has ended. <a href=\"/\">Start a new one</a>.</p></body></html>\n"
        .to_string()
}
