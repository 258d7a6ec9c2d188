//! Email rendering: the internal submission email and the two client
//! follow-ups. Inline HTML, no templating engine.

use mb_domain::brief::{Daypart, DesignerBrief};
use mb_store::FollowUpKind;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn layout(title: &str, body: String) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,Helvetica,sans-serif;\
         color:#1d2733;max-width:640px;margin:0 auto;padding:24px\">\
         <h2 style=\"color:#0d5c63\">{title}</h2>{body}\
         <p style=\"color:#7a8691;font-size:12px;margin-top:32px\">BMAsia Music Design</p>\
         </body></html>",
        title = escape(title),
    )
}

/// The internal submission email sent to the production team.
pub struct SubmissionEmail<'a> {
    pub brief_id: Option<i64>,
    pub venue_name: &'a str,
    pub venue_type: &'a str,
    pub location: &'a str,
    pub contact_name: &'a str,
    pub contact_email: &'a str,
    pub designer_brief: &'a DesignerBrief,
    pub dayparts: &'a [Daypart],
    pub approval_url: Option<&'a str>,
    pub schedule_prebuilt: bool,
    pub auto_scheduled: bool,
}

pub fn submission_email(email: &SubmissionEmail<'_>) -> (String, String) {
    let subject = match email.brief_id {
        Some(id) => format!("Music brief #{id} — {}", email.venue_name),
        None => format!("Music brief — {}", email.venue_name),
    };

    let mut body = format!(
        "<p><strong>{}</strong> ({}) — {}</p>\
         <p>Contact: {} &lt;{}&gt;</p>",
        escape(email.venue_name),
        escape(email.venue_type),
        escape(email.location),
        escape(email.contact_name),
        escape(email.contact_email),
    );

    if email.schedule_prebuilt {
        body.push_str(
            "<p style=\"background:#e7f6ee;padding:8px 12px;border-radius:6px\">\
             &#9989; A schedule has been pre-built on the platform and will go \
             live at approval.</p>",
        );
    }
    if email.auto_scheduled {
        body.push_str(
            "<p style=\"background:#e7f0f6;padding:8px 12px;border-radius:6px\">\
             This venue qualifies for auto-scheduling; entries were activated \
             without an approval step.</p>",
        );
    }

    body.push_str("<h3>Day shape</h3><ul>");
    for part in email.dayparts {
        body.push_str(&format!(
            "<li>{} — energy {}/10</li>",
            escape(&part.label),
            part.energy
        ));
    }
    body.push_str("</ul>");

    body.push_str(&format!(
        "<h3>Designer brief</h3><p>Top genres: {}</p><p>BPM: {}</p>",
        escape(&email.designer_brief.top_genres.join(", ")),
        escape(&email.designer_brief.bpm_ranges.join(", ")),
    ));

    if let Some(url) = email.approval_url {
        body.push_str(&format!(
            "<p style=\"margin-top:24px\"><a href=\"{url}\" style=\"background:#0d5c63;\
             color:#fff;padding:12px 20px;border-radius:6px;text-decoration:none\">\
             Review &amp; activate the schedule</a></p>\
             <p style=\"color:#7a8691;font-size:12px\">The link is valid for 7 days.</p>",
        ));
    }

    (subject.clone(), layout(&subject, body))
}

/// 7-day check-in / 30-day refresh emails, with the 1×1 open-tracking
/// pixel appended.
pub fn follow_up_email(kind: FollowUpKind, venue_name: &str, pixel_url: &str) -> (String, String) {
    let (subject, message) = match kind {
        FollowUpKind::SevenDay => (
            format!("How is the music landing at {venue_name}?"),
            "It has been a week since your new music schedule went in. A quick \
             reply with what is working (and what is not) lets our designers \
             fine-tune the rotation.",
        ),
        FollowUpKind::ThirtyDay => (
            format!("A month of music at {venue_name} — time for a refresh?"),
            "Your schedule has been running for a month. Seasons, events, and \
             crowds shift; tell us what has changed and we will refresh the \
             brief to match.",
        ),
    };

    let body = format!(
        "<p>{}</p><img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" />",
        escape(message),
        pixel_url,
    );
    (subject.clone(), layout(&subject, body))
}
