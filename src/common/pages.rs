use rust_embed::RustEmbed;
use spin_sdk::http::Response;

#[derive(RustEmbed)]
#[folder = "templates"]
struct Pages;

const PATH_PLACEHOLDER: &str = "PAGE_PATH";

fn html_response(status: u16, html: String) -> Response {
    Response::builder()
        .status(status)
        .header("content-type", "text/html; charset=utf-8")
        .body(html.into_bytes())
        .build()
}

fn load(name: &str) -> Option<String> {
    Pages::get(name).and_then(|file| String::from_utf8(file.data.to_vec()).ok())
}

pub fn not_found_page(path: &str) -> Response {
    let escaped_path = html_escape::encode_text(path).to_string();
    let html = load("misc/404.html")
        .map(|template| template.replace(PATH_PLACEHOLDER, &escaped_path))
        .unwrap_or_else(|| format!("<h1>Page not found</h1><p>{}</p>", escaped_path));
    html_response(404, html)
}

pub fn server_error_page() -> Response {
    let html = load("misc/500.html").unwrap_or_else(|| "<h1>Server error</h1>".to_string());
    html_response(500, html)
}

/// Static "about" pages: `author` and `tech`.
pub fn about_page(name: &str) -> Option<Response> {
    if !matches!(name, "author" | "tech") {
        return None;
    }
    load(&format!("about/{}.html", name)).map(|html| html_response(200, html))
}
