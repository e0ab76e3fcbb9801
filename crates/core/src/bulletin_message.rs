//! Composition of batched bulletin alert messages.
//!
//! One message is produced per (user, bulletin date) batch and channel. A
//! single alert names its case and court; several alerts only state the count
//! and point to the general bulletin, since an enumerated list of courts
//! quickly exceeds template length limits and becomes unreadable.

use chrono::NaiveDate;

use crate::delivery::PendingAlert;

/// WhatsApp template for a single matched case.
pub const TEMPLATE_SINGLE_CASE: &str = "alerta_boletin_caso";

/// WhatsApp template for several matched cases on the same bulletin.
pub const TEMPLATE_MULTIPLE_CASES: &str = "alerta_boletin_varios";

/// Maximum length of a single WhatsApp template parameter.
pub const MAX_TEMPLATE_PARAM_CHARS: usize = 1024;

/// Greeting used when the user has no display name.
const DEFAULT_RECIPIENT_NAME: &str = "Usuario";

/// A rendered notification ready to hand to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMessage {
    /// Email subject line.
    pub subject: String,
    /// Plain-text body (email text part).
    pub text: String,
    /// HTML body (email HTML part).
    pub html: String,
    /// WhatsApp template name.
    pub template_name: &'static str,
    /// WhatsApp template body parameters, in placeholder order.
    pub template_params: Vec<String>,
    /// Number of alerts covered by the message.
    pub alert_count: usize,
}

/// Format a bulletin date the way the courts publish it (`DD/MM/YYYY`).
pub fn format_bulletin_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Render the message for `alerts`, all belonging to one user and one date.
///
/// `app_url`, when present, is linked from the email as the place to review
/// the alerts.
pub fn compose(
    recipient_name: Option<&str>,
    bulletin_date: NaiveDate,
    alerts: &[&PendingAlert],
    app_url: Option<&str>,
) -> BatchMessage {
    let name = recipient_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_RECIPIENT_NAME);
    let date = format_bulletin_date(bulletin_date);

    match alerts {
        [single] => compose_single(name, &date, single, app_url),
        _ => compose_multiple(name, &date, alerts, app_url),
    }
}

fn compose_single(name: &str, date: &str, alert: &PendingAlert, app_url: Option<&str>) -> BatchMessage {
    let case = alert.case_label();
    let court = alert.court_name.split_whitespace().collect::<Vec<_>>().join(" ");

    let subject = format!("Tu expediente {case} aparece en el boletín del {date}");
    let mut text = format!(
        "Hola {name},\n\nEl expediente {case} del {court} aparece publicado en el boletín judicial del {date}.\n"
    );
    let mut html = format!(
        "<p>Hola {},</p><p>El expediente <strong>{}</strong> del {} aparece publicado en el boletín judicial del {}.</p>",
        escape_html(name),
        escape_html(&case),
        escape_html(&court),
        escape_html(date),
    );
    append_link(&mut text, &mut html, app_url);

    BatchMessage {
        subject,
        text,
        html,
        template_name: TEMPLATE_SINGLE_CASE,
        template_params: vec![
            template_param(name),
            template_param(&case),
            template_param(&court),
            template_param(date),
        ],
        alert_count: 1,
    }
}

fn compose_multiple(
    name: &str,
    date: &str,
    alerts: &[&PendingAlert],
    app_url: Option<&str>,
) -> BatchMessage {
    let count = alerts.len();
    let subject = format!("{count} de tus expedientes aparecen en el boletín del {date}");

    let cases: Vec<String> = alerts.iter().map(|a| a.case_label()).collect();

    let mut text = format!(
        "Hola {name},\n\n{count} de tus expedientes aparecen publicados en el boletín judicial del {date}. \
         Consulta el boletín general para ver el detalle de cada acuerdo.\n\nExpedientes:\n"
    );
    for case in &cases {
        text.push_str("- ");
        text.push_str(case);
        text.push('\n');
    }

    let mut html = format!(
        "<p>Hola {},</p><p>{} de tus expedientes aparecen publicados en el boletín judicial del {}. \
         Consulta el boletín general para ver el detalle de cada acuerdo.</p><ul>",
        escape_html(name),
        count,
        escape_html(date),
    );
    for case in &cases {
        html.push_str("<li>");
        html.push_str(&escape_html(case));
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    append_link(&mut text, &mut html, app_url);

    BatchMessage {
        subject,
        text,
        html,
        template_name: TEMPLATE_MULTIPLE_CASES,
        template_params: vec![
            template_param(name),
            count.to_string(),
            template_param(date),
        ],
        alert_count: count,
    }
}

fn append_link(text: &mut String, html: &mut String, app_url: Option<&str>) {
    if let Some(url) = app_url.filter(|u| !u.trim().is_empty()) {
        text.push_str(&format!("\nRevisa tus alertas en {url}\n"));
        html.push_str(&format!(
            "<p><a href=\"{}\">Revisa tus alertas</a></p>",
            escape_html(url)
        ));
    }
}

/// Make a value safe for a WhatsApp template parameter.
///
/// Template parameters may not contain newlines, tabs, or long runs of
/// spaces, and are length-limited.
pub fn template_param(value: &str) -> String {
    let flat = value.split_whitespace().collect::<Vec<_>>().join(" ");
    flat.chars().take(MAX_TEMPLATE_PARAM_CHARS).collect()
}

/// Escape the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
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
