//! Guesses the TOPS class of a train from the coarse attributes in its schedule.
//!
//! Rules are tried in order and the first match wins, so operator-specific
//! rules sit above the generic ones.

use crate::schedule::Schedule;

use serde::Serialize;

#[derive(Clone, Copy, Debug)]
enum Pattern {
    Any,
    Exactly(&'static str),
}

use Pattern::{Any, Exactly};

impl Pattern {
    fn matches(self, value: Option<&str>) -> bool {
        match self {
            Any => true,
            Exactly(expected) => value == Some(expected),
        }
    }
}

struct Rule {
    atoc: Pattern,
    power: Pattern,
    speed: Pattern,
    timing_load: Pattern,
    seating_class: Pattern,
    classes: &'static [&'static str],
    familiar_name: Option<&'static str>,
    image: Option<&'static str>,
}

const fn rule(
    key: (Pattern, Pattern, Pattern, Pattern, Pattern),
    classes: &'static [&'static str],
    familiar_name: Option<&'static str>,
    image: Option<&'static str>,
) -> Rule {
    Rule {
        atoc: key.0,
        power: key.1,
        speed: key.2,
        timing_load: key.3,
        seating_class: key.4,
        classes,
        familiar_name,
        image,
    }
}

#[rustfmt::skip]
static RULES: &[Rule] = &[
    rule((Exactly("VT"), Exactly("EMU"), Exactly("125"), Exactly("390"), Any), &["390"], Some("Pendolino"), None),
    rule((Exactly("LO"), Exactly("EMU"), Exactly("075"), Exactly("375"), Any), &["378"], Some("Capitalstar"), Some("lo378")),
    rule((Exactly("LO"), Exactly("EMU"), Exactly("075"), Exactly("313"), Any), &["378"], Some("Capitalstar"), Some("lo378")),
    rule((Exactly("LO"), Exactly("EMU"), Any, Exactly("315"), Any), &["315"], None, None),
    rule((Exactly("LO"), Exactly("EMU"), Any, Exactly("317"), Any), &["317"], None, Some("xn317")),
    rule((Exactly("XR"), Exactly("EMU"), Any, Exactly("315"), Any), &["315"], None, None),
    rule((Exactly("SR"), Exactly("EMU"), Any, Exactly("0"), Any), &["380"], Some("Desiro"), Some("sr380")),
    rule((Exactly("LM"), Exactly("EMU"), Any, Exactly("350"), Any), &["350"], Some("Desiro"), Some("lm350")),
    rule((Exactly("LM"), Exactly("EMU"), Any, Exactly("323"), Any), &["323"], None, None),
    rule((Exactly("TP"), Exactly("EMU"), Any, Exactly("350"), Any), &["350"], Some("Desiro"), Some("tp350")),
    rule((Exactly("ME"), Exactly("EMU"), Any, Any, Any), &["507", "508"], None, Some("me507-508")),
    rule((Exactly("SE"), Exactly("EMU"), Any, Exactly("395"), Any), &["395"], Some("Javelin"), Some("se395")),

    rule((Any, Exactly("EMU"), Any, Exactly("321"), Any), &["321"], None, None),
    rule((Any, Exactly("EMU"), Any, Exactly("357"), Any), &["357"], None, None),
    rule((Any, Exactly("EMU"), Any, Exactly("483"), Any), &["483"], None, None),
    // HST is an IC125 in practice; IC225s are E
    rule((Any, Exactly("HST"), Any, Any, Any), &["43"], Some("High Speed Train"), None),

    // South Western EMUs are only told apart by seating class
    rule((Exactly("SW"), Exactly("EMU"), Any, Any, Exactly("S")), &["455", "456", "458", "707"], None, None),
    rule((Exactly("SW"), Exactly("EMU"), Any, Any, Exactly("B")), &["444", "450", "458"], None, None),
    rule((Exactly("SW"), Exactly("DMU"), Any, Exactly("X"), Any), &["159"], Some("South Western Turbo"), Some("xn159")),

    rule((Exactly("HX"), Exactly("EMU"), Any, Exactly("360"), Any), &["360"], Some("Desiro"), None),
    rule((Exactly("HX"), Exactly("EMU"), Any, Any, Any), &["332"], None, None),

    rule((Exactly("NT"), Exactly("DMU"), Any, Exactly("A"), Any), &["142", "144"], Some("Pacer"), None),
    rule((Exactly("GW"), Exactly("DMU"), Any, Exactly("A"), Any), &["143"], Some("Pacer"), None),
    rule((Exactly("EM"), Exactly("DMU"), Exactly("125"), Any, Any), &["222"], Some("Meridian"), Some("em222")),
    rule((Exactly("GR"), Exactly("E"), Exactly("125"), Any, Any), &["91"], None, None),

    rule((Any, Exactly("DMU"), Any, Exactly("A"), Any), &["142", "143", "144"], Some("Pacer"), None),
    rule((Any, Exactly("DMU"), Any, Exactly("E"), Any), &["158", "168", "170", "175"], None, None),
    rule((Any, Exactly("DMU"), Any, Exactly("N"), Any), &["165"], Some("Network Turbo"), None),
    rule((Any, Exactly("DMU"), Any, Exactly("S"), Any), &["150", "153", "155", "156"], Some("(Super) Sprinter"), None),
    rule((Any, Exactly("DMU"), Any, Exactly("T"), Any), &["165", "166"], None, None),
    rule((Any, Exactly("DMU"), Any, Exactly("V"), Any), &["220", "221"], Some("(Super) Voyager"), None),
    rule((Any, Exactly("DMU"), Any, Exactly("X"), Any), &["158", "159"], Some("Express Sprinter"), Some("xn159")),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopsInference {
    pub inferred_label: String,
    pub possible_classes: Vec<&'static str>,
    pub familiar_name: Option<&'static str>,
    /// Key into the configured image table.
    pub image_ref: Option<&'static str>,
}

pub fn infer(
    atoc: Option<&str>,
    power: Option<&str>,
    speed: Option<&str>,
    timing_load: Option<&str>,
    seating_class: Option<&str>,
) -> Option<TopsInference> {
    RULES
        .iter()
        .find(|rule| {
            rule.atoc.matches(atoc)
                && rule.power.matches(power)
                && rule.speed.matches(speed)
                && rule.timing_load.matches(timing_load)
                && rule.seating_class.matches(seating_class)
        })
        .map(|rule| TopsInference {
            inferred_label: rule.classes.join("/"),
            possible_classes: rule.classes.to_vec(),
            familiar_name: rule.familiar_name,
            image_ref: rule.image,
        })
}

pub fn infer_for_schedule(schedule: &Schedule) -> Option<TopsInference> {
    infer(
        schedule.atoc_code.as_deref(),
        schedule.power_type.as_deref(),
        schedule.speed.as_deref(),
        schedule.timing_load.as_deref(),
        schedule.seating_class.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(atoc: &str, power: &str, timing_load: &str) -> Option<String> {
        infer(Some(atoc), Some(power), None, Some(timing_load), None).map(|x| x.inferred_label)
    }

    #[test]
    fn operator_specific_rules_win_over_generic_ones() {
        let se = infer(Some("SE"), Some("EMU"), Some("140"), Some("395"), Some("S")).unwrap();
        assert_eq!(se.inferred_label, "395");
        assert_eq!(se.familiar_name, Some("Javelin"));
        assert_eq!(se.image_ref, Some("se395"));

        let sw = infer(Some("SW"), Some("DMU"), Some("090"), Some("X"), None).unwrap();
        assert_eq!(sw.possible_classes, vec!["159"]);
        let other = infer(Some("GW"), Some("DMU"), Some("090"), Some("X"), None).unwrap();
        assert_eq!(other.inferred_label, "158/159");
    }

    #[test]
    fn first_match_is_taken_even_when_later_rules_also_match() {
        // the 075 speed is part of the LO 375 rule
        let lo = infer(Some("LO"), Some("EMU"), Some("075"), Some("375"), None).unwrap();
        assert_eq!(lo.possible_classes, vec!["378"]);
        let slower = infer(Some("LO"), Some("EMU"), Some("100"), Some("375"), None);
        assert!(slower.is_none());

        // HX 360 is listed before the catch-all HX rule
        assert_eq!(label("HX", "EMU", "360").as_deref(), Some("360"));
        assert_eq!(label("HX", "EMU", "332").as_deref(), Some("332"));

        // NT Pacers exclude the 143
        assert_eq!(label("NT", "DMU", "A").as_deref(), Some("142/144"));
        assert_eq!(label("XC", "DMU", "A").as_deref(), Some("142/143/144"));
    }

    #[test]
    fn wildcards_match_absent_values_but_literals_do_not() {
        let hst = infer(None, Some("HST"), None, None, None).unwrap();
        assert_eq!(hst.inferred_label, "43");
        assert!(infer(Some("SW"), Some("EMU"), None, None, None).is_none());
        assert!(infer(None, None, None, None, None).is_none());
    }

    #[test]
    fn every_rule_has_classes() {
        assert!(RULES.iter().all(|rule| !rule.classes.is_empty()));
    }
}
