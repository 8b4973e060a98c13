//! Brochure templates: turn an [`ExportRequest`] into self-contained markup

use crate::request::{ExportRequest, DEFAULT_BRAND_COLOR};
use crate::Result;
use htmlize::{escape_attribute, escape_text};
use log::warn;
use std::fmt::Write as _;

/// Produces the full HTML document for a brochure
pub trait TemplateRenderer {
    fn render(&self, request: &ExportRequest) -> Result<String>;
}

/// Hero, features, about, call-to-action and contact sections on a plain page
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTemplate;

const BASIC_STYLE: &str = r#"
  body { margin: 0; font-family: system-ui, -apple-system, sans-serif; color: #111827; background: #ffffff; }
  section { padding: 56px 32px; }
  .inner { max-width: 960px; margin: 0 auto; }
  .hero { color: #ffffff; text-align: center; padding: 80px 32px; }
  .hero img { height: 80px; margin: 0 auto 32px; display: block; }
  .hero h1 { font-size: 44px; margin: 0 0 20px; }
  .hero p { font-size: 20px; opacity: 0.9; margin: 0; }
  h2 { font-size: 30px; margin: 0 0 32px; }
  .features h2 { text-align: center; }
  .grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 24px; }
  .card { padding: 24px; border: 1px solid #e5e7eb; border-radius: 8px; }
  .card h3 { margin: 0 0 12px; font-size: 20px; }
  .card p { margin: 0; color: #4b5563; }
  .about { background: #f9fafb; }
  .about p { font-size: 18px; line-height: 1.6; color: #374151; }
  .cta { color: #ffffff; text-align: center; }
  .buttons { display: flex; flex-wrap: wrap; justify-content: center; gap: 16px; margin-top: 32px; }
  .buttons a { padding: 12px 24px; background: #ffffff; color: #111827; border-radius: 8px; font-weight: 600; text-decoration: none; }
  .contact { background: #111827; color: #ffffff; }
  .contact a { color: #ffffff; }
  .muted { color: #9ca3af; margin-top: 32px; }
"#;

impl TemplateRenderer for BasicTemplate {
    fn render(&self, request: &ExportRequest) -> Result<String> {
        let content = &request.content;
        let contact = &request.contact_details;
        let brand = brand_color(&request.brand_color);
        let website = contact.website_url();

        let mut html = String::with_capacity(8 * 1024);
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
             <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n",
            escape_text(&content.hero_title),
            BASIC_STYLE
        );

        let _ = write!(
            html,
            "<section class=\"hero\" style=\"background: linear-gradient(to right, {brand}, {brand}dd);\">\n<div class=\"inner\">\n"
        );
        if let Some(logo) = request.logo_url.as_deref().filter(|l| !l.is_empty()) {
            let _ = writeln!(html, "<img src=\"{}\" alt=\"Logo\">", escape_attribute(logo));
        }
        let _ = write!(
            html,
            "<h1>{}</h1>\n<p>{}</p>\n</div>\n</section>\n",
            escape_text(&content.hero_title),
            escape_text(&content.hero_subtitle)
        );

        html.push_str("<section class=\"features\">\n<div class=\"inner\">\n<h2>Features</h2>\n<div class=\"grid\">\n");
        for feature in &content.features {
            let _ = write!(
                html,
                "<div class=\"card\"><h3 style=\"color: {brand};\">{}</h3><p>{}</p></div>\n",
                escape_text(&feature.title),
                escape_text(&feature.description)
            );
        }
        html.push_str("</div>\n</div>\n</section>\n");

        let _ = write!(
            html,
            "<section class=\"about\">\n<div class=\"inner\">\n<h2>About Us</h2>\n<p>{}</p>\n</div>\n</section>\n",
            escape_text(&content.about)
        );

        let _ = write!(
            html,
            "<section class=\"cta\" style=\"background-color: {brand};\">\n<div class=\"inner\">\n<h2>{}</h2>\n<div class=\"buttons\">\n",
            escape_text(&content.cta)
        );
        if let Some(phone) = non_empty(&contact.phone) {
            let _ = writeln!(html, "<a href=\"tel:{}\">Call Us</a>", escape_attribute(phone));
        }
        if let Some(email) = non_empty(&contact.email) {
            let _ = writeln!(html, "<a href=\"mailto:{}\">Email Us</a>", escape_attribute(email));
        }
        if let Some(url) = &website {
            let _ = writeln!(html, "<a href=\"{}\" target=\"_blank\">Visit Website</a>", escape_attribute(url));
        }
        html.push_str("</div>\n</div>\n</section>\n");

        html.push_str("<section class=\"contact\">\n<div class=\"inner\">\n<h2>Contact Us</h2>\n");
        if let Some(phone) = non_empty(&contact.phone) {
            let _ = writeln!(html, "<p><strong>Phone:</strong> {}</p>", escape_text(phone));
        }
        if let Some(whatsapp) = non_empty(&contact.whatsapp) {
            let _ = writeln!(html, "<p><strong>WhatsApp:</strong> {}</p>", escape_text(whatsapp));
        }
        if let Some(email) = non_empty(&contact.email) {
            let _ = writeln!(html, "<p><strong>Email:</strong> {}</p>", escape_text(email));
        }
        if let (Some(url), Some(label)) = (&website, non_empty(&contact.website)) {
            let _ = writeln!(
                html,
                "<p><strong>Website:</strong> <a href=\"{}\">{}</a></p>",
                escape_attribute(url),
                escape_text(label)
            );
        }
        let _ = write!(
            html,
            "<p class=\"muted\">{}</p>\n</div>\n</section>\n</body>\n</html>\n",
            escape_text(&content.contact)
        );

        Ok(html)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Only `#rgb`, `#rrggbb` and `#rrggbbaa` colours reach the style attributes
fn brand_color(raw: &str) -> &str {
    let raw = raw.trim();
    let ok = raw
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if ok {
        raw
    } else {
        warn!("Ignoring brand colour {:?}; using {}", raw, DEFAULT_BRAND_COLOR);
        DEFAULT_BRAND_COLOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{BrochureContent, ContactDetails, Feature};

    fn request() -> ExportRequest {
        let mut req = ExportRequest::new(BrochureContent {
            hero_title: "Acme <Rockets>".into(),
            hero_subtitle: "To orbit & back".into(),
            features: vec![
                Feature {
                    title: "Fast".into(),
                    description: "Very fast".into(),
                },
                Feature {
                    title: "Safe".into(),
                    description: "Mostly".into(),
                },
            ],
            about: "Family run since 1950".into(),
            cta: "Book a launch".into(),
            contact: "Open weekdays".into(),
        });
        req.contact_details = ContactDetails {
            phone: Some("+1 555 0100".into()),
            whatsapp: None,
            email: Some("hi@acme.example".into()),
            website: Some("acme.example".into()),
        };
        req
    }

    #[test]
    fn renders_all_sections() {
        let html = BasicTemplate.render(&request()).unwrap();
        assert_eq!(html.matches("<section").count(), 5);
        assert_eq!(html.matches("class=\"card\"").count(), 2);
        assert!(html.contains("href=\"tel:+1 555 0100\""));
        assert!(html.contains("href=\"mailto:hi@acme.example\""));
        assert!(html.contains("href=\"https://acme.example\""));
        assert!(!html.contains("WhatsApp"));
    }

    #[test]
    fn user_text_is_escaped() {
        let html = BasicTemplate.render(&request()).unwrap();
        assert!(html.contains("Acme &lt;Rockets&gt;"));
        assert!(html.contains("To orbit &amp; back"));
        assert!(!html.contains("<Rockets>"));
    }

    #[test]
    fn invalid_brand_colour_falls_back() {
        let mut req = request();
        req.brand_color = "red;\" onload=\"x".into();
        let html = BasicTemplate.render(&req).unwrap();
        assert!(html.contains(DEFAULT_BRAND_COLOR));
        assert!(!html.contains("onload"));
        req.brand_color = "#AbC123".into();
        assert!(BasicTemplate.render(&req).unwrap().contains("#AbC123"));
    }

    #[test]
    fn logo_is_optional() {
        let mut req = request();
        assert!(!BasicTemplate.render(&req).unwrap().contains("alt=\"Logo\""));
        req.logo_url = Some("https://cdn.example/logo.png".into());
        assert!(BasicTemplate.render(&req).unwrap().contains("src=\"https://cdn.example/logo.png\""));
    }
}
