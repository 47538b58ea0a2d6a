//! Receipt PDF layout.
//!
//! One A4 page, builtin Helvetica, French wording. The owner's signature
//! arrives as a `data:image/...;base64,` URI; anything malformed degrades
//! to printing the owner's name instead of failing the receipt.

use base64::Engine;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference,
    Point,
};

use crate::error::{AppError, AppResult};
use crate::models::Tenant;
use crate::schemas::UserConfig;
use crate::services::receipts::{format_amount, last_day_of_month, month_name};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;

/// Helvetica has no embedded metrics here, so centering works off an
/// average glyph width. Good enough for a one-line header.
fn centered_x(text: &str, font_size: f32) -> f32 {
    let text_width_mm = text.chars().count() as f32 * font_size * 0.18;
    ((PAGE_WIDTH_MM - text_width_mm) / 2.0).max(MARGIN_MM)
}

struct Cursor<'a> {
    layer: &'a PdfLayerReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
    y: f32,
}

impl Cursor<'_> {
    fn line(&mut self, text: &str, size: f32) {
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), self.regular);
        self.y -= size * 0.55;
    }

    fn bold_line(&mut self, text: &str, size: f32) {
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), self.bold);
        self.y -= size * 0.55;
    }

    fn centered_bold(&mut self, text: &str, size: f32) {
        self.layer
            .use_text(text, size, Mm(centered_x(text, size)), Mm(self.y), self.bold);
        self.y -= size * 0.55;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn separator(&mut self) {
        let line = Line {
            points: vec![
                (Point::new(Mm(MARGIN_MM), Mm(self.y)), false),
                (Point::new(Mm(PAGE_WIDTH_MM - MARGIN_MM), Mm(self.y)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
        self.y -= 6.0;
    }
}

fn decode_signature(data_uri: &str) -> Option<printpdf::image_crate::DynamicImage> {
    let encoded = data_uri.split_once(',')?.1;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    printpdf::image_crate::load_from_memory(&bytes).ok()
}

pub fn render_receipt(
    config: &UserConfig,
    tenant: &Tenant,
    month: u32,
    year: i32,
) -> AppResult<Vec<u8>> {
    let title = format!("Quittance de loyer - {} {}", month_name(month), year);
    let (doc, page, layer) = PdfDocument::new(
        &title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Quittance",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|error| AppError::Render(format!("Could not load PDF font: {error}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|error| AppError::Render(format!("Could not load PDF font: {error}")))?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut cursor = Cursor {
        layer: &layer,
        regular: &regular,
        bold: &bold,
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };

    let owner_name = config.owner_full_name();
    let month_label = month_name(month);
    let last_day = last_day_of_month(year, month);
    let today = chrono::Utc::now().format("%d/%m/%Y").to_string();

    cursor.centered_bold(&config.app_name, 16.0);
    cursor.gap(8.0);

    // Owner block, then tenant block on the right margin side of the page
    // is overkill for a quittance; both are stacked like the paper form.
    if !owner_name.is_empty() {
        cursor.bold_line(&owner_name, 11.0);
    }
    if !config.owner.address.trim().is_empty() {
        cursor.line(config.owner.address.trim(), 11.0);
    }
    cursor.gap(6.0);

    cursor.bold_line(&tenant.full_name(), 11.0);
    if !tenant.address.trim().is_empty() {
        cursor.line(tenant.address.trim(), 11.0);
    }
    cursor.gap(8.0);

    cursor.bold_line(
        &format!("Objet : Quittance de loyer du mois de {month_label} {year}"),
        12.0,
    );
    cursor.gap(2.0);
    cursor.line(&format!("Fait le {today}"), 10.0);
    cursor.gap(8.0);
    cursor.separator();

    let total = format_amount(tenant.total());
    cursor.line(
        &format!("Je soussign\u{e9}(e) {owner_name}, propri\u{e9}taire du logement d\u{e9}sign\u{e9} ci-dessus,"),
        11.0,
    );
    cursor.line(
        &format!(
            "d\u{e9}clare avoir re\u{e7}u de {} la somme de {total} euros,",
            tenant.full_name()
        ),
        11.0,
    );
    cursor.line(
        "au titre du paiement du loyer et des charges pour la p\u{e9}riode de location",
        11.0,
    );
    cursor.line(
        &format!("du 1er {month_label} {year} au {last_day} {month_label} {year},"),
        11.0,
    );
    cursor.line(
        "et lui en donne quittance, sous r\u{e9}serve de tous mes droits.",
        11.0,
    );
    cursor.gap(10.0);

    cursor.bold_line("D\u{e9}tail du r\u{e8}glement :", 11.0);
    cursor.gap(2.0);
    cursor.line(
        &format!("Loyer : {} \u{20ac}", format_amount(tenant.rent)),
        11.0,
    );
    cursor.line(
        &format!(
            "Provision pour charges : {} \u{20ac}",
            format_amount(tenant.charges)
        ),
        11.0,
    );
    cursor.line("Contribution aux \u{e9}nergies : 0,00 \u{20ac}", 11.0);
    cursor.gap(2.0);
    cursor.bold_line(&format!("Total : {total} \u{20ac}"), 11.0);
    cursor.gap(4.0);
    cursor.line(&format!("Date du paiement : {today}"), 11.0);
    cursor.gap(14.0);

    cursor.line("Signature :", 11.0);
    cursor.gap(2.0);
    match decode_signature(&config.owner.signature) {
        Some(image) => {
            cursor.gap(22.0);
            Image::from_dynamic_image(&image).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(MARGIN_MM)),
                    translate_y: Some(Mm(cursor.y)),
                    scale_x: Some(0.35),
                    scale_y: Some(0.35),
                    ..Default::default()
                },
            );
            cursor.gap(6.0);
        }
        None => {
            cursor.bold_line(&owner_name, 11.0);
            cursor.gap(4.0);
        }
    }

    cursor.y = MARGIN_MM + 8.0;
    cursor.separator();
    cursor.line(
        "Cette quittance annule tous les re\u{e7}us qui auraient pu \u{ea}tre \u{e9}tablis pr\u{e9}c\u{e9}demment",
        8.0,
    );
    cursor.line(
        "en cas de paiement partiel du montant du pr\u{e9}sent terme. Quittance \u{e9}tablie",
        8.0,
    );
    cursor.line(
        "conform\u{e9}ment \u{e0} la loi n\u{b0} 89-462 du 6 juillet 1989.",
        8.0,
    );

    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|error| AppError::Render(format!("Could not serialize receipt PDF: {error}")))?;
    writer
        .into_inner()
        .map_err(|error| AppError::Render(format!("Could not serialize receipt PDF: {error}")))
}

#[cfg(test)]
mod tests {
    use super::{centered_x, decode_signature, render_receipt, MARGIN_MM};
    use crate::models::Tenant;
    use crate::schemas::UserConfig;
    use chrono::Utc;
    use uuid::Uuid;

    fn tenant() -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            last_name: "Dupont".to_string(),
            first_name: "Marie".to_string(),
            email: Some("marie@example.com".to_string()),
            rent: 500.0,
            charges: 50.0,
            address: "12 rue de la Paix, 75002 Paris".to_string(),
            property_id: None,
            last_receipt_sent_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn renders_a_nonempty_pdf() {
        let mut config = UserConfig::default();
        config.owner.last_name = "Martin".to_string();
        config.owner.first_name = "Jean".to_string();
        config.owner.address = "3 avenue Hugo, 69003 Lyon".to_string();

        let bytes = render_receipt(&config, &tenant(), 5, 2024).expect("render should succeed");
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn malformed_signature_falls_back_to_text() {
        let mut config = UserConfig::default();
        config.owner.signature = "data:image/png;base64,!!not-base64!!".to_string();
        let bytes = render_receipt(&config, &tenant(), 2, 2024).expect("render should succeed");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn signature_decoding_rejects_junk() {
        assert!(decode_signature("").is_none());
        assert!(decode_signature("no-comma-here").is_none());
        assert!(decode_signature("data:image/png;base64,AAAA").is_none());
    }

    #[test]
    fn centering_never_leaves_the_margin() {
        let long = "x".repeat(400);
        assert_eq!(centered_x(&long, 16.0), MARGIN_MM);
    }
}
