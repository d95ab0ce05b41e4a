use std::fmt;

/// One of the four labels shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmotionLabel {
    Happy,
    Sad,
    Sleepy,
    Neutral,
}

impl EmotionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "Feliz",
            EmotionLabel::Sad => "Triste",
            EmotionLabel::Sleepy => "Sleepy",
            EmotionLabel::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold rule mapping face probabilities to a label.
///
/// Checks run in order, first match wins: smile above `happy_above`, smile
/// below `sad_below`, both eyes below `eyes_closed_below`, otherwise neutral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    pub happy_above: f32,
    pub sad_below: f32,
    pub eyes_closed_below: f32,
}

impl Classifier {
    /// Single split at 0.5. Sleepy and neutral only occur at a smile of
    /// exactly 0.5.
    pub const fn exact() -> Self {
        Self {
            happy_above: 0.5,
            sad_below: 0.5,
            eyes_closed_below: 0.5,
        }
    }

    /// Neutral band of [0.4, 0.6] on the smile score.
    pub const fn banded() -> Self {
        Self {
            happy_above: 0.6,
            sad_below: 0.4,
            eyes_closed_below: 0.5,
        }
    }

    pub fn classify(&self, smile: f32, left_eye_open: f32, right_eye_open: f32) -> EmotionLabel {
        if smile > self.happy_above {
            EmotionLabel::Happy
        } else if smile < self.sad_below {
            EmotionLabel::Sad
        } else if left_eye_open < self.eyes_closed_below && right_eye_open < self.eyes_closed_below
        {
            EmotionLabel::Sleepy
        } else {
            EmotionLabel::Neutral
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::exact()
    }
}

/// Classify with the default 0.5 rule.
pub fn classify(smile: f32, left_eye_open: f32, right_eye_open: f32) -> EmotionLabel {
    Classifier::exact().classify(smile, left_eye_open, right_eye_open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.9, 1.0, 1.0, EmotionLabel::Happy)]
    #[case(0.1, 1.0, 1.0, EmotionLabel::Sad)]
    #[case(0.5, 0.2, 0.3, EmotionLabel::Sleepy)]
    #[case(0.5, 0.9, 0.9, EmotionLabel::Neutral)]
    #[case(0.5, 0.2, 0.9, EmotionLabel::Neutral)]
    #[case(0.5, 0.5, 0.1, EmotionLabel::Neutral)]
    fn test_reference_cases(
        #[case] smile: f32,
        #[case] left: f32,
        #[case] right: f32,
        #[case] expected: EmotionLabel,
    ) {
        assert_eq!(classify(smile, left, right), expected);
    }

    #[test]
    fn test_above_half_is_happy_regardless_of_eyes() {
        for smile in [0.5001, 0.6, 0.75, 1.0] {
            for eyes in [0.0, 0.3, 1.0] {
                assert_eq!(classify(smile, eyes, eyes), EmotionLabel::Happy);
            }
        }
    }

    #[test]
    fn test_below_half_is_sad_even_with_closed_eyes() {
        for smile in [0.0, 0.2, 0.4999] {
            assert_eq!(classify(smile, 0.0, 0.0), EmotionLabel::Sad);
            assert_eq!(classify(smile, 1.0, 1.0), EmotionLabel::Sad);
        }
    }

    #[test]
    fn test_labels_render_as_display_strings() {
        assert_eq!(EmotionLabel::Happy.to_string(), "Feliz");
        assert_eq!(EmotionLabel::Sad.to_string(), "Triste");
        assert_eq!(EmotionLabel::Sleepy.to_string(), "Sleepy");
        assert_eq!(EmotionLabel::Neutral.to_string(), "Neutral");
    }

    #[rstest]
    #[case(0.65, 1.0, 1.0, EmotionLabel::Happy)]
    #[case(0.55, 1.0, 1.0, EmotionLabel::Neutral)]
    #[case(0.45, 0.1, 0.1, EmotionLabel::Sleepy)]
    #[case(0.35, 0.1, 0.1, EmotionLabel::Sad)]
    fn test_banded_policy(
        #[case] smile: f32,
        #[case] left: f32,
        #[case] right: f32,
        #[case] expected: EmotionLabel,
    ) {
        assert_eq!(Classifier::banded().classify(smile, left, right), expected);
    }

    #[test]
    fn test_nan_smile_falls_through_to_eyes() {
        assert_eq!(classify(f32::NAN, 0.1, 0.1), EmotionLabel::Sleepy);
        assert_eq!(classify(f32::NAN, 0.9, 0.9), EmotionLabel::Neutral);
    }
}
