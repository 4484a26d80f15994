use crate::domain::report::Currency;
use crate::email::ReportEmail;
use rust_decimal::Decimal;

/// HTML body of the report email.
pub fn render_html(email: &ReportEmail) -> String {
    let currency = email.currency;

    let mut html = format!(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#1f2937;\">\
         <h1 style=\"color:#0f766e;\">{title} Report</h1>\
         <p>Hello {name},</p>\
         <p>Here is your financial summary for {period}.</p>\
         <table cellpadding=\"6\" style=\"border-collapse:collapse;\">\
         <tr><td>Total Income</td><td><strong>{income}</strong></td></tr>\
         <tr><td>Total Expenses</td><td><strong>{expense}</strong></td></tr>\
         <tr><td>Net Savings</td><td><strong>{balance}</strong></td></tr>\
         <tr><td>Savings Rate</td><td><strong>{rate}%</strong></td></tr>\
         </table>",
        title = email.frequency.label(),
        name = escape(&email.recipient_name),
        period = email.period,
        income = format_amount(email.total_income, currency),
        expense = format_amount(email.total_expense, currency),
        balance = format_amount(email.available_balance, currency),
        rate = email.savings_rate,
    );

    if !email.top_categories.is_empty() {
        html.push_str("<h2>Top Spending Categories</h2><ul>");
        for cat in &email.top_categories {
            html.push_str(&format!(
                "<li>{category}: {total} ({share}%)</li>",
                category = escape(&cat.category),
                total = format_amount(cat.total, currency),
                share = share_of(cat.total, email.total_expense),
            ));
        }
        html.push_str("</ul>");
    }

    html.push_str(&format!(
        "<h2>Insights</h2><p>{}</p>\
         <p style=\"color:#6b7280;font-size:12px;\">You are receiving this because monthly reports are enabled in your settings.</p>\
         </body></html>",
        escape(&email.insight),
    ));

    html
}

/// Amount with currency symbol and locale grouping, two decimal places.
/// INR groups as 12,34,567.00, USD as 1,234,567.00.
pub fn format_amount(amount: Decimal, currency: Currency) -> String {
    let rounded = amount.abs().round_dp(2);
    let fixed = format!("{rounded:.2}");
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let grouped = match currency {
        Currency::Inr => group_indian(whole),
        Currency::Usd => group_thousands(whole),
    };
    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{}{grouped}.{frac}", currency.symbol())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut out = String::with_capacity(digits.len() + digits.len() / 2);
    for (i, ch) in head.chars().enumerate() {
        if i > 0 && (head.len() - i) % 2 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push(',');
    out.push_str(tail);
    out
}

/// Percentage of `total` taken by `part`, one decimal place.
fn share_of(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (part / total * Decimal::ONE_HUNDRED).round_dp(1)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
