//! System prompts for vision-model document extraction.
//!
//! One prompt per document kind. Each asks for a single flat JSON object so
//! the reply can be parsed by [`crate::pipeline::postprocess`] without any
//! model-specific handling. Field names match the constants in
//! [`crate::slot`].

use crate::slot::{DocumentKind, Party};

const REPLY_RULES: &str = r#"
Reply rules:
- Output ONLY one JSON object, no commentary and no code fences.
- Use exactly the keys listed above. Use null for anything you cannot read.
- Copy values exactly as printed. Do not guess or complete partial values.
- If the image is not this kind of document, reply {"success": false, "message": "<what you see instead>"}."#;

/// Prompt for a driver's license.
pub const LICENSE_PROMPT: &str = r#"You read photographs and scans of driver's licenses.

Extract these fields:
- "full_name": holder's full name
- "national_id": national identity / taxpayer number of the holder
- "birth_date": date of birth as printed
- "license_number": license registration number
- "expiry_date": expiry date as printed
- "category": license category letters"#;

/// Prompt for a vehicle registration certificate.
pub const REGISTRATION_PROMPT: &str = r#"You read photographs and scans of vehicle registration certificates.

Extract these fields:
- "plate": license plate
- "registry_number": national vehicle registry number
- "chassis": chassis / VIN
- "make_model": make and model as printed
- "model_year": manufacture / model year
- "owner_name": registered owner's name"#;

/// Prompt for a police incident report.
pub const POLICE_REPORT_PROMPT: &str = r#"You read police incident reports.

Extract these fields:
- "report_number": report / occurrence number
- "issued_on": date the report was filed"#;

/// Full system prompt for a document kind.
pub fn system_prompt(kind: DocumentKind) -> String {
    let body = match kind {
        DocumentKind::License => LICENSE_PROMPT,
        DocumentKind::Registration => REGISTRATION_PROMPT,
        DocumentKind::PoliceReport => POLICE_REPORT_PROMPT,
    };
    format!("{body}\n{REPLY_RULES}")
}

/// User-turn text accompanying the image.
pub fn user_instruction(kind: DocumentKind, party: Party) -> String {
    let whose = match party {
        Party::Owner => "the policy holder",
        Party::ThirdParty => "the other party involved",
    };
    let what = match kind {
        DocumentKind::License => "driver's license",
        DocumentKind::Registration => "vehicle registration",
        DocumentKind::PoliceReport => "police report",
    };
    format!("This is the {what} of {whose}.")
}
