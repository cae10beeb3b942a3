use maud::{html, Markup, PreEscaped, DOCTYPE};

const STYLE: &str = r#"
body { background: linear-gradient(135deg, #eff6ff, #e0e7ff); min-height: 100vh; }
.chat { max-width: 56rem; margin: 0 auto; }
#transcript { max-height: 32rem; overflow-y: auto; padding: 1rem; }
.msg { display: flex; margin-bottom: 1rem; }
.msg.user { justify-content: flex-end; }
.bubble { border-radius: .5rem; padding: .5rem 1rem; max-width: 48rem; }
.msg.user .bubble { background: #3b82f6; color: #fff; }
.msg.assistant .bubble { background: #f3f4f6; color: #1f2937; }
.bubble small { display: block; opacity: .7; }
.score-high { color: #22c55e; }
.score-mid { color: #eab308; }
.score-low { color: #ef4444; }
.overall { text-align: center; font-size: 2.5rem; font-weight: 700; margin: 0; }
.badge { border-radius: 999px; padding: .1rem .5rem; font-size: .75rem; font-weight: 600; }
.badge.complete { background: #dcfce7; color: #166534; }
.badge.partial { background: #fef9c3; color: #854d0e; }
.badge.missing { background: #fee2e2; color: #991b1b; }
.placeholder-note { background: #fff7ed; border-left: 4px solid #f97316; padding: .5rem 1rem; }
#dropzone { border: 2px dashed #d1d5db; border-radius: .5rem; padding: 2rem; text-align: center; }
#dropzone.active { border-color: #3b82f6; background: #eff6ff; }
#loading { display: none; }
#loading.htmx-request { display: block; }
"#;

fn head(title: &str) -> Markup {
    html! {
        head {
            meta charset="utf-8";
            meta name="viewport" content="width=device-width, initial-scale=1";
            meta name="color-scheme" content="light";
            link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/@picocss/pico@2/css/pico.min.css";
            script src="https://unpkg.com/htmx.org@2.0.4" {}
            style { (PreEscaped(STYLE)) }
            title { (title) }
        }
    }
}

pub fn page(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(title))
            body {
                main."container" {
                    hgroup style="text-align: center;" {
                        h1 { "AI Assignment Evaluator" }
                        p { "Upload handwritten assignments and get instant AI-powered analysis" }
                    }
                    (body)
                }
            }
        }
    }
}
