use maud::{html, Markup, PreEscaped};

use crate::chat::{Author, Message};
use crate::views::analysis;

/// Drag-and-drop onto the zone feeds the file input and submits the form;
/// the form is reset after every request so the same file can be re-sent.
const UPLOAD_SCRIPT: &str = r#"
(function () {
  var zone = document.getElementById('dropzone');
  var form = document.getElementById('upload-form');
  var input = document.getElementById('file-input');
  input.addEventListener('change', function () {
    if (input.files.length > 0) { htmx.trigger(form, 'submit'); }
  });
  zone.addEventListener('dragover', function (e) { e.preventDefault(); zone.classList.add('active'); });
  zone.addEventListener('dragleave', function (e) { e.preventDefault(); zone.classList.remove('active'); });
  zone.addEventListener('drop', function (e) {
    e.preventDefault();
    zone.classList.remove('active');
    if (e.dataTransfer.files.length > 0) {
      input.files = e.dataTransfer.files;
      htmx.trigger(form, 'submit');
    }
  });
  function localTimes(root) {
    root.querySelectorAll('time[datetime]').forEach(function (el) {
      var d = new Date(el.getAttribute('datetime'));
      if (!isNaN(d)) {
        el.textContent = d.toLocaleTimeString([], { hour: '2-digit', minute: '2-digit' });
      }
    });
  }
  localTimes(document);
  document.body.addEventListener('htmx:afterSwap', function (e) { localTimes(e.detail.target); });
  form.addEventListener('htmx:afterRequest', function () {
    form.reset();
    var t = document.getElementById('transcript');
    t.scrollTop = t.scrollHeight;
  });
})();
"#;

fn author_class(author: Author) -> &'static str {
    match author {
        Author::User => "user",
        Author::Assistant => "assistant",
    }
}

/// One transcript entry, with its analysis card when it carries one.
pub fn message(m: &Message) -> Markup {
    html! {
        div class={"msg " (author_class(m.author))} id=(format!("msg-{}", m.id)) {
            div.bubble {
                p style="margin: 0;" { (m.content) }
                @if let Some(name) = &m.file_name {
                    small { "📄 " (name) }
                }
                small {
                    time datetime=(m.datetime_attr()) { (m.time_label()) " UTC" }
                }
            }
        }
        @if let Some(a) = &m.analysis {
            (analysis::card(a, m.placeholder))
        }
    }
}

/// Fragment appended to the transcript after an upload.
pub fn exchange(messages: &[Message]) -> Markup {
    html! {
        @for m in messages {
            (message(m))
        }
    }
}

fn upload_form() -> Markup {
    html! {
        form #upload-form
             hx-post="/chat/upload"
             hx-encoding="multipart/form-data"
             hx-target="#transcript"
             hx-swap="beforeend"
             hx-indicator="#loading"
             hx-disabled-elt="#choose-button" {
            div #dropzone {
                h3 { "Upload Assignment" }
                p { "Drag and drop your PDF or photo here, or click to browse" }
                input #file-input type="file" name="file" accept=".pdf,image/*" hidden;
                button #choose-button type="button"
                       onclick="document.getElementById('file-input').click()" {
                    "Choose File"
                }
            }
        }
    }
}

/// The whole chat page body: transcript, loading indicator and upload area.
pub fn chat(greeting: &Message) -> Markup {
    html! {
        article.chat {
            div #transcript {
                (message(greeting))
            }
            p #loading aria-busy="true" { "Analyzing assignment..." }
            (upload_form())
        }
        script { (PreEscaped(UPLOAD_SCRIPT)) }
    }
}
