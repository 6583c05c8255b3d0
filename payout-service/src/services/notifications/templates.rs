//! Plain-text and HTML bodies for partner payout emails.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::email::EmailMessage;
use super::PayoutEmail;
use crate::models::ProgramSummary;

pub fn format_currency(cents: i64) -> String {
    format!("${}", Decimal::new(cents, 2))
}

fn format_period(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<String> {
    let fmt = |d: DateTime<Utc>| d.format("%b %-d, %Y").to_string();
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("{} - {}", fmt(start), fmt(end))),
        (Some(start), None) => Some(format!("since {}", fmt(start))),
        (None, Some(end)) => Some(format!("until {}", fmt(end))),
        (None, None) => None,
    }
}

fn period_clause(payout: &PayoutEmail) -> String {
    format_period(payout.period_start, payout.period_end)
        .map(|p| format!(" for {}", p))
        .unwrap_or_default()
}

pub fn payout_confirmed(program: &ProgramSummary, payout: &PayoutEmail) -> EmailMessage {
    let amount = format_currency(payout.amount);
    let period = period_clause(payout);

    EmailMessage {
        to: payout.email.clone(),
        subject: "You've got money coming your way!".to_string(),
        body_text: format!(
            "{program} has confirmed a payout of {amount}{period}.\n\n\
             The funds are being transferred and will reach your account once the bank transfer settles.",
            program = program.name,
        ),
        body_html: Some(format!(
            "<p><strong>{program}</strong> has confirmed a payout of <strong>{amount}</strong>{period}.</p>\
             <p>The funds are being transferred and will reach your account once the bank transfer settles.</p>",
            program = program.name,
        )),
    }
}

pub fn payout_sent(program: &ProgramSummary, payout: &PayoutEmail) -> EmailMessage {
    let amount = format_currency(payout.amount);
    let period = period_clause(payout);

    EmailMessage {
        to: payout.email.clone(),
        subject: "You've been paid!".to_string(),
        body_text: format!(
            "{program} has sent you {amount}{period}.\n\n\
             The payment is now in your PayPal account.",
            program = program.name,
        ),
        body_html: Some(format!(
            "<p><strong>{program}</strong> has sent you <strong>{amount}</strong>{period}.</p>\
             <p>The payment is now in your PayPal account.</p>",
            program = program.name,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn currency_is_rendered_in_dollars() {
        assert_eq!(format_currency(10_500), "$105.00");
        assert_eq!(format_currency(7), "$0.07");
    }

    #[test]
    fn confirmed_email_names_program_amount_and_period() {
        let program = ProgramSummary {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            logo: None,
        };
        let payout = PayoutEmail {
            payout_id: Uuid::new_v4(),
            email: "pat@example.com".to_string(),
            amount: 2_500,
            period_start: Some(Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap()),
            period_end: Some(Utc.with_ymd_and_hms(2026, 9, 30, 0, 0, 0).unwrap()),
        };

        let email = payout_confirmed(&program, &payout);
        assert_eq!(email.to, "pat@example.com");
        assert!(email.body_text.contains("Acme"));
        assert!(email.body_text.contains("$25.00"));
        assert!(email.body_text.contains("Sep 1, 2026 - Sep 30, 2026"));
    }
}
