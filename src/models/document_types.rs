// src/models/document_types.rs

/// Coarse categories understood by the AI/ML service.
pub const AI_PASSPORT: &str = "passport";
pub const AI_DRIVER_LICENSE: &str = "driver-license";
pub const AI_ID_CARD: &str = "id-card";
pub const AI_CERTIFICATE: &str = "certificate";
pub const AI_OTHER: &str = "other";

const ID_DOCUMENTS: &[&str] = &[
    "aadhar-card", "pan-card", "voter-id", "passport", "driving-license",
    "ration-card", "npr-id", "social-security-id", "employee-id-card",
    "student-id-card", "senior-citizen-card", "visa", "oci-card", "pio-card",
    "other-id-document",
];

const EDUCATIONAL: &[&str] = &[
    "ssc-marksheet", "hsc-marksheet", "diploma-certificate", "bachelor-degree",
    "master-degree", "provisional-certificate", "migration-certificate",
    "character-certificate", "transfer-certificate", "bonafide-certificate",
    "admit-card", "hall-ticket", "entrance-exam-result", "internship-certificate",
    "mooc-certificate", "other-educational-document",
];

const GOVERNMENT: &[&str] = &[
    "caste-certificate", "income-certificate", "domicile-certificate", "birth-certificate",
    "death-certificate", "disability-certificate", "ews-certificate", "marriage-certificate",
    "police-character-certificate", "gazette-name-change", "adoption-certificate",
    "legal-heir-certificate", "obc-certificate", "sc-certificate", "st-certificate",
    "other-govt-certificate",
];

const FINANCIAL: &[&str] = &[
    "bank-passbook", "bank-statement", "salary-slip", "form-16", "itr", "pf-details",
    "loan-approval", "emi-schedule", "credit-card-statement", "investment-proof",
    "uan-slip", "upi-receipt", "other-financial-document",
];

const ADDRESS_PROOF: &[&str] = &[
    "address-aadhar-card", "address-voter-id", "address-passport", "electricity-bill",
    "water-bill", "gas-bill", "property-tax-receipt", "rent-agreement",
    "telephone-bill", "sale-deed", "address-bank-passbook", "address-ration-card",
    "other-address-proof",
];

const EMPLOYMENT: &[&str] = &[
    "offer-letter", "appointment-letter", "experience-letter", "relieving-letter",
    "salary-certificate", "employment-agreement", "joining-report", "noc",
    "promotion-letter", "appraisal-letter", "internship-letter", "employment-id",
    "other-work-document",
];

const MEDICAL: &[&str] = &[
    "medical-report", "covid-vaccine-certificate", "covid-test-report", "health-card",
    "insurance-policy", "insurance-claim", "doctor-prescription", "discharge-summary",
    "opd-slip", "blood-group-card", "other-medical-document",
];

const MISCELLANEOUS: &[&str] = &[
    "affidavit", "notarized-document", "self-declaration", "non-employment-agreement",
    "court-order", "legal-notice", "school-leaving-certificate", "hostel-form",
    "club-membership-card", "rc", "driving-school-certificate", "personal-notes",
    "other-miscellaneous",
];

/// Values accepted before the catalogue was expanded.
const LEGACY: &[&str] = &["passport", "id-card", "driver-license", "certificate", "other"];

const CATALOGUE: &[&[&str]] = &[
    ID_DOCUMENTS,
    EDUCATIONAL,
    GOVERNMENT,
    FINANCIAL,
    ADDRESS_PROOF,
    EMPLOYMENT,
    MEDICAL,
    MISCELLANEOUS,
    LEGACY,
];

pub fn is_supported(document_type: &str) -> bool {
    CATALOGUE.iter().any(|group| group.contains(&document_type))
}

/// Maps a catalogue entry onto the category the AI/ML service analyses it as.
pub fn ai_category(document_type: &str) -> &'static str {
    match document_type {
        "passport" | "address-passport" => AI_PASSPORT,
        "driving-license" | "driver-license" => AI_DRIVER_LICENSE,
        t if ID_DOCUMENTS.contains(&t) || t == "id-card" => AI_ID_CARD,
        t if EDUCATIONAL.contains(&t) || GOVERNMENT.contains(&t) || t == "certificate" => {
            AI_CERTIFICATE
        }
        _ => AI_OTHER,
    }
}
