use anyhow::{Context, Result};
use clap::ValueEnum;
use scraper::{ElementRef, Html, Node};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::{SCRAPE_TIMEOUT_SECS, SCRAPE_USER_AGENT};
use crate::utils::osc8_file_link;

/// What to keep from the fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScrapeMode {
    /// Response body as-is
    #[default]
    RawHtml,
    /// Page text with link and image markers inlined
    Annotated,
}

fn client_builder() -> reqwest::blocking::ClientBuilder {
    reqwest::blocking::Client::builder()
        .user_agent(SCRAPE_USER_AGENT)
        .timeout(Duration::from_secs(SCRAPE_TIMEOUT_SECS))
}

pub fn fetch_page(url: &str, mode: ScrapeMode) -> Result<String> {
    fetch_with(&client_builder().build()?, url, mode)
}

/// Non-2xx responses are errors
fn fetch_with(client: &reqwest::blocking::Client, url: &str, mode: ScrapeMode) -> Result<String> {
    let body = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch: {}", url))?
        .error_for_status()
        .with_context(|| format!("HTTP error from: {}", url))?
        .text()
        .with_context(|| format!("Failed to read response: {}", url))?;

    Ok(match mode {
        ScrapeMode::RawHtml => body,
        ScrapeMode::Annotated => annotate_html(&body),
    })
}

pub fn write_page(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// Flatten a page to text, appending ` [LINK:href]` after links and
/// ` [IMG alt='..', src='..']` after images
pub fn annotate_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    collect_annotated(document.root_element(), &mut text);

    // Collapse runs of whitespace
    let mut cleaned = String::new();
    let mut prev_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_was_space && !cleaned.is_empty() {
                cleaned.push(' ');
                prev_was_space = true;
            }
        } else {
            cleaned.push(c);
            prev_was_space = false;
        }
    }
    cleaned.trim().to_string()
}

fn collect_annotated(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let tag = child_el.value().name();
                if matches!(tag, "script" | "style" | "noscript") {
                    continue;
                }
                collect_annotated(child_el, out);
                match tag {
                    "a" => {
                        if let Some(href) = child_el.value().attr("href") {
                            out.push_str(&format!(" [LINK:{}]", href));
                        }
                    }
                    "img" => {
                        out.push_str(&format!(
                            " [IMG alt='{}', src='{}']",
                            child_el.value().attr("alt").unwrap_or(""),
                            child_el.value().attr("src").unwrap_or("")
                        ));
                    }
                    _ => {}
                }
                out.push(' ');
            }
            _ => {}
        }
    }
}

/// Fetch `url` and store it at `output`
pub fn run_scrape(url: &str, mode: ScrapeMode, output: &Path, quiet: bool) -> Result<()> {
    tracing::debug!(url, mode = ?mode, "Fetching page");
    let blob = fetch_page(url, mode)?;
    write_page(output, &blob)?;

    if !quiet {
        println!(
            "Wrote stadium page ({} chars) to {}",
            blob.chars().count(),
            osc8_file_link(output, &output.display().to_string())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single canned HTTP response on a loopback port
    fn serve_once(response: &'static str) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/wiki/stadiums", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
        });
        (url, handle)
    }

    fn loopback_client() -> reqwest::blocking::Client {
        client_builder().no_proxy().build().unwrap()
    }

    #[test]
    fn test_fetch_page_rejects_non_success_status() {
        let (url, handle) =
            serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");

        let err = fetch_with(&loopback_client(), &url, ScrapeMode::RawHtml).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("HTTP error from"));
        assert!(message.contains("404"));

        handle.join().unwrap();
    }

    #[test]
    fn test_fetch_page_returns_body() {
        let (url, handle) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 42\r\nConnection: close\r\n\r\n\
             <html><body><p>BMO Field</p></body></html>",
        );

        assert_eq!(
            fetch_with(&loopback_client(), &url, ScrapeMode::RawHtml).unwrap(),
            "<html><body><p>BMO Field</p></body></html>"
        );

        handle.join().unwrap();
    }

    #[test]
    fn test_annotate_html() {
        let html = r#"<html><head><style>p { color: red }</style></head><body>
            <p>See <a href="/wiki/BMO_Field">BMO   Field</a>.</p>
            <img alt="Stadium" src="//upload.wikimedia.org/x.jpg">
            <script>var x = 1;</script>
            </body></html>"#;

        let text = annotate_html(html);
        assert!(text.contains("BMO Field [LINK:/wiki/BMO_Field]"));
        assert!(text.contains("[IMG alt='Stadium', src='//upload.wikimedia.org/x.jpg']"));
        assert!(!text.contains("color"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_write_page_creates_parents() {
        let dir = std::env::temp_dir().join(format!("mls-stadiums-scrape-{}", std::process::id()));
        let path = dir.join("nested").join("page.txt");

        write_page(&path, "<html>é</html>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html>é</html>");

        fs::remove_dir_all(&dir).unwrap();
    }
}
