//! HTML documents (rendered to PDF) and email bodies.
//!
//! Every value that came from a customer or the catalog goes through
//! [escape_html] before it is interpolated.

use std::fmt::Write;

use crate::core::catalog::Product;
use crate::core::models::{format_cents, Payment, Quotation};

const COMPANY: &str = "Desert Solutions";

const STYLE: &str = "body{font-family:Helvetica,Arial,sans-serif;color:#222;font-size:12px}\
h1{color:#b5531b;margin-bottom:0}\
table{border-collapse:collapse;width:100%;margin-top:16px}\
th,td{border-bottom:1px solid #ddd;padding:6px;text-align:left}\
td.num,th.num{text-align:right}\
.muted{color:#777}\
figure{page-break-inside:avoid;margin:24px 0}\
figure img{max-width:100%;max-height:8in}";

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
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

/// Inline an image so the renderer doesn't need to fetch anything.
pub fn data_uri(content_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, base64::encode(data))
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{}</style></head><body>{}</body></html>",
        escape_html(title),
        STYLE,
        body
    )
}

fn customer_block(quotation: &Quotation) -> String {
    let customer = &quotation.customer;
    let mut block = String::from("<p><strong>Prepared for</strong><br>");
    if let Some(company) = &customer.company {
        let _ = write!(block, "{}<br>", escape_html(company));
    }
    let _ = write!(block, "{}<br>{}", escape_html(&customer.name), escape_html(&customer.email));
    if let Some(phone) = &customer.phone {
        let _ = write!(block, "<br>{}", escape_html(phone));
    }
    if let Some(address) = &customer.address {
        let _ = write!(block, "<br>{}", escape_html(address));
    }
    block.push_str("</p>");
    block
}

/// The quotation document.
pub fn quotation_html(quotation: &Quotation) -> String {
    let mut body = format!(
        "<h1>{}</h1><p class=\"muted\">Quotation {} &middot; issued {} &middot; valid until {}</p>",
        COMPANY,
        escape_html(&quotation.quote_number),
        quotation.created_date.format("%B %-d, %Y"),
        quotation.valid_until.format("%B %-d, %Y"),
    );
    body.push_str(&customer_block(quotation));

    body.push_str(
        "<table><tr><th>SKU</th><th>Item</th><th class=\"num\">Qty</th>\
         <th class=\"num\">Unit price</th><th class=\"num\">Amount</th></tr>",
    );
    for item in &quotation.items {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
             <td class=\"num\">{}</td></tr>",
            escape_html(&item.sku),
            escape_html(&item.name),
            item.quantity,
            format_cents(item.unit_price_cents),
            format_cents(item.line_total_cents),
        );
    }
    let totals = [
        ("Subtotal", quotation.subtotal_cents),
        ("Sales tax", quotation.tax_cents),
        ("Installation", quotation.installation_cents),
    ];
    for (label, cents) in totals.iter() {
        let _ = write!(
            body,
            "<tr><td colspan=\"4\" class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            label,
            format_cents(*cents)
        );
    }
    let _ = write!(
        body,
        "<tr><th colspan=\"4\" class=\"num\">Total</th><th class=\"num\">{}</th></tr></table>",
        format_cents(quotation.total_cents)
    );

    if let Some(notes) = &quotation.notes {
        let _ = write!(body, "<h3>Notes</h3><p>{}</p>", escape_html(notes));
    }
    body.push_str(
        "<p class=\"muted\">Installation labor is not subject to sales tax. \
         Prices are in US dollars.</p>",
    );

    page(&format!("Quotation {}", quotation.quote_number), &body)
}

/// A one-page product datasheet. `image` is a data URI.
pub fn datasheet_html(product: &Product, image: Option<&str>) -> String {
    let mut body = format!(
        "<h1>{}</h1><p class=\"muted\">{} &middot; {}</p>",
        escape_html(&product.name),
        escape_html(&product.sku),
        format_cents(product.price_cents),
    );
    if let Some(src) = image {
        let _ = write!(
            body,
            "<figure><img src=\"{}\" alt=\"{}\"></figure>",
            escape_html(src),
            escape_html(&product.name)
        );
    }
    let _ = write!(body, "<p>{}</p>", escape_html(&product.description));

    let specs = product.spec_lines();
    if !specs.is_empty() {
        body.push_str("<h3>Specifications</h3><table>");
        for (label, value) in specs {
            let _ = write!(body, "<tr><th>{}</th><td>{}</td></tr>", label, escape_html(&value));
        }
        body.push_str("</table>");
    }

    page(&format!("{} datasheet", product.name), &body)
}

/// A photo for the addendum, already inlined.
#[derive(Clone, Debug, PartialEq)]
pub struct Photo {
    pub filename: String,
    pub data_uri: String,
}

/// Site photos attached to a quotation, one per figure.
pub fn photo_addendum_html(quotation: &Quotation, photos: &[Photo]) -> String {
    let mut body = format!(
        "<h1>Photo Addendum</h1><p class=\"muted\">Quotation {} &middot; {}</p>",
        escape_html(&quotation.quote_number),
        escape_html(quotation.customer.display_name()),
    );
    for photo in photos {
        let _ = write!(
            body,
            "<figure><img src=\"{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>",
            escape_html(&photo.data_uri),
            escape_html(&photo.filename),
            escape_html(&photo.filename),
        );
    }
    page(&format!("Photo addendum {}", quotation.quote_number), &body)
}

/// Rendered email content.
#[derive(Clone, Debug, PartialEq)]
pub struct EmailBody {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn quotation_email(quotation: &Quotation) -> EmailBody {
    let name = &quotation.customer.name;
    let total = format_cents(quotation.total_cents);
    let valid_until = quotation.valid_until.format("%B %-d, %Y");

    EmailBody {
        subject: format!("Your {} quotation {}", COMPANY, quotation.quote_number),
        html: format!(
            "<p>Hi {},</p><p>Thank you for considering {}. Your quotation <strong>{}</strong> \
             for <strong>{}</strong> is attached as a PDF. It is valid until {}.</p>\
             <p>Reply to this email with any questions.</p>",
            escape_html(name),
            COMPANY,
            escape_html(&quotation.quote_number),
            total,
            valid_until,
        ),
        text: format!(
            "Hi {},\n\nThank you for considering {}. Your quotation {} for {} is attached \
             as a PDF. It is valid until {}.\n\nReply to this email with any questions.\n",
            name, COMPANY, quotation.quote_number, total, valid_until,
        ),
    }
}

pub fn payment_receipt_email(quotation: &Quotation, payment: &Payment) -> EmailBody {
    let name = &quotation.customer.name;
    let amount = format_cents(payment.amount_cents);
    let received = payment.received_at.format("%B %-d, %Y");

    EmailBody {
        subject: format!("Payment received for {}", quotation.quote_number),
        html: format!(
            "<p>Hi {},</p><p>We received your payment of <strong>{}</strong> on {} for \
             quotation {}. Our team will contact you to schedule delivery.</p>\
             <p>Thank you for choosing {}.</p>",
            escape_html(name),
            amount,
            received,
            escape_html(&quotation.quote_number),
            COMPANY,
        ),
        text: format!(
            "Hi {},\n\nWe received your payment of {} on {} for quotation {}. Our team will \
             contact you to schedule delivery.\n\nThank you for choosing {}.\n",
            name, amount, received, quotation.quote_number, COMPANY,
        ),
    }
}

pub fn sales_notification_email(quotation: &Quotation, payment: &Payment) -> EmailBody {
    let customer = quotation.customer.display_name();
    let amount = format_cents(payment.amount_cents);

    EmailBody {
        subject: format!("Paid: {} ({})", quotation.quote_number, customer),
        html: format!(
            "<p>{} paid <strong>{}</strong> for quotation {} (invoice {}).</p>\
             <p>Quotation total: {}<br>Contact: {} &lt;{}&gt;</p>",
            escape_html(customer),
            amount,
            escape_html(&quotation.quote_number),
            escape_html(&payment.invoice_id),
            format_cents(quotation.total_cents),
            escape_html(&quotation.customer.name),
            escape_html(&quotation.customer.email),
        ),
        text: format!(
            "{} paid {} for quotation {} (invoice {}).\n\nQuotation total: {}\n\
             Contact: {} <{}>\n",
            customer,
            amount,
            quotation.quote_number,
            payment.invoice_id,
            format_cents(quotation.total_cents),
            quotation.customer.name,
            quotation.customer.email,
        ),
    }
}
