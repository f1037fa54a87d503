// src/services/scoring.rs

use crate::{
    models::document::{Authenticity, DocumentStatus},
    services::ai_ml::{AnalysisReport, FormatReport, OcrReport, SignatureReport},
};

const AI_WEIGHT: f64 = 0.5;
const FORMAT_WEIGHT: f64 = 0.2;
const OCR_WEIGHT: f64 = 0.1;
const SIGNATURE_WEIGHT: f64 = 0.1;
const QUALITY_WEIGHT: f64 = 0.1;

const PENALTY_PER_ANOMALY: f64 = 0.1;
const MAX_ANOMALY_PENALTY: f64 = 0.3;

/// Signature confidence assumed when a signature is found but the service gave none.
const DETECTED_SIGNATURE_DEFAULT: f64 = 0.7;
/// Neutral signature score when no signature is found.
const UNDETECTED_SIGNATURE_SCORE: f64 = 0.5;

const VERIFIED_THRESHOLD: f64 = 0.8;
const REVIEW_THRESHOLD: f64 = 0.6;

/// Weighted authenticity score in `[0, 1]`.
pub fn authenticity_score(
    analysis: &AnalysisReport,
    format: &FormatReport,
    ocr: &OcrReport,
    signature: &SignatureReport,
) -> f64 {
    let signature_score = if signature.signature_detected {
        signature
            .confidence
            .filter(|c| *c > 0.0)
            .unwrap_or(DETECTED_SIGNATURE_DEFAULT)
    } else {
        UNDETECTED_SIGNATURE_SCORE
    };

    let penalty =
        (analysis.anomalies.len() as f64 * PENALTY_PER_ANOMALY).min(MAX_ANOMALY_PENALTY);

    let score = analysis.confidence_score * AI_WEIGHT
        + format.format_score * FORMAT_WEIGHT
        + ocr.confidence * OCR_WEIGHT
        + signature_score * SIGNATURE_WEIGHT
        + analysis.quality_score * QUALITY_WEIGHT
        - penalty;

    score.clamp(0.0, 1.0)
}

/// Maps a score onto the document status and authenticity verdict.
pub fn classify(score: f64) -> (DocumentStatus, Authenticity) {
    if score >= VERIFIED_THRESHOLD {
        (DocumentStatus::Verified, Authenticity::Authentic)
    } else if score >= REVIEW_THRESHOLD {
        (DocumentStatus::PendingReview, Authenticity::Suspicious)
    } else {
        (DocumentStatus::Rejected, Authenticity::Fake)
    }
}

/// Score as a whole percentage.
pub fn as_percent(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports(
        ai: f64,
        quality: f64,
        anomalies: usize,
        format_score: f64,
        ocr: f64,
        signature: Option<f64>,
    ) -> (AnalysisReport, FormatReport, OcrReport, SignatureReport) {
        (
            AnalysisReport {
                confidence_score: ai,
                quality_score: quality,
                anomalies: (0..anomalies).map(|i| format!("anomaly {}", i)).collect(),
                ..AnalysisReport::default()
            },
            FormatReport {
                format_score,
                ..FormatReport::default()
            },
            OcrReport {
                confidence: ocr,
                ..OcrReport::default()
            },
            SignatureReport {
                signature_detected: signature.is_some(),
                confidence: signature,
                ..SignatureReport::default()
            },
        )
    }

    fn score_of(r: &(AnalysisReport, FormatReport, OcrReport, SignatureReport)) -> f64 {
        authenticity_score(&r.0, &r.1, &r.2, &r.3)
    }

    #[test]
    fn perfect_inputs_score_one() {
        let r = reports(1.0, 1.0, 0, 1.0, 1.0, Some(1.0));
        assert!((score_of(&r) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_are_applied() {
        // 0.8*0.5 + 0.5*0.2 + 0.6*0.1 + 0.5(no signature)*0.1 + 0.4*0.1
        let r = reports(0.8, 0.4, 0, 0.5, 0.6, None);
        assert!((score_of(&r) - 0.65).abs() < 1e-9);
    }

    #[test]
    fn detected_signature_without_confidence_uses_default() {
        let with_zero = reports(0.0, 0.0, 0, 0.0, 0.0, Some(0.0));
        assert!((score_of(&with_zero) - 0.07).abs() < 1e-9);
    }

    #[test]
    fn anomaly_penalty_is_capped() {
        let three = reports(1.0, 1.0, 3, 1.0, 1.0, Some(1.0));
        let ten = reports(1.0, 1.0, 10, 1.0, 1.0, Some(1.0));

        assert!((score_of(&three) - 0.7).abs() < 1e-9);
        assert!((score_of(&ten) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn score_never_goes_negative() {
        let r = reports(0.0, 0.0, 5, 0.0, 0.0, None);
        assert_eq!(score_of(&r), 0.0);
    }

    #[test]
    fn thresholds() {
        assert_eq!(classify(0.8), (DocumentStatus::Verified, Authenticity::Authentic));
        assert_eq!(classify(0.79), (DocumentStatus::PendingReview, Authenticity::Suspicious));
        assert_eq!(classify(0.6), (DocumentStatus::PendingReview, Authenticity::Suspicious));
        assert_eq!(classify(0.59), (DocumentStatus::Rejected, Authenticity::Fake));
    }

    #[test]
    fn percentages_round() {
        assert_eq!(as_percent(0.876), 88);
        assert_eq!(as_percent(1.2), 100);
        assert_eq!(as_percent(0.0), 0);
    }
}
