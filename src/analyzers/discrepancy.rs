use crate::analyzers::aggregate::Aggregator;
use crate::analyzers::grade::recommended_grade;
use crate::analyzers::types::{Discrepancy, MarkValue, PeriodScheme, PeriodSlot};

/// Recommended grade for a slot, with a missing average counted as zero.
pub fn slot_recommendation(slot: &PeriodSlot) -> MarkValue {
    recommended_grade(&slot.average.or_zero())
}

/// Whether a slot's recommended grade differs from its actual grade.
/// Missing values on either side count as zero.
pub fn is_mismatch(slot: &PeriodSlot) -> bool {
    !slot_recommendation(slot).same_grade(&slot.actual.or_zero())
}

/// Collects every period whose recommended grade differs from the actual
/// one, walking students by name, subjects in first-seen order and periods
/// in order.
pub fn find_discrepancies(aggregator: &Aggregator, scheme: PeriodScheme) -> Vec<Discrepancy> {
    let mut found = Vec::new();

    for (student, record) in aggregator.students() {
        for subject in aggregator.subjects() {
            let Some(slots) = record.get(subject) else {
                continue;
            };
            for (period, slot) in slots.iter().enumerate().take(scheme.active_periods()) {
                if !is_mismatch(slot) {
                    continue;
                }
                found.push(Discrepancy {
                    student: student.clone(),
                    subject: subject.clone(),
                    period,
                    average: slot.average.or_zero(),
                    recommended: slot_recommendation(slot),
                    actual: slot.actual.or_zero(),
                });
            }
        }
    }

    found
}

/// Orders discrepancies by subject, keeping encounter order within a subject.
pub fn sort_by_subject(discrepancies: &mut [Discrepancy]) {
    discrepancies.sort_by(|a, b| a.subject.cmp(&b.subject));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: f64) -> MarkValue {
        MarkValue::Numeric(v)
    }

    fn slot(average: MarkValue, actual: MarkValue) -> PeriodSlot {
        PeriodSlot { average, actual }
    }

    #[test]
    fn test_scenarios() {
        // 3.4 recommends 3, finals say 4.
        assert!(is_mismatch(&slot(num(3.4), num(4.0))));
        assert!(!is_mismatch(&slot(num(4.5), num(5.0))));
        assert!(!is_mismatch(&slot(num(0.0), MarkValue::Missing)));
        assert!(is_mismatch(&slot(MarkValue::Missing, num(3.0))));
        // Missing actual against a real average.
        assert!(is_mismatch(&slot(num(4.2), MarkValue::Missing)));
        assert!(!is_mismatch(&slot(MarkValue::Missing, MarkValue::Missing)));
    }

    #[test]
    fn test_markers() {
        let exempt = || MarkValue::Marker("осв".into());
        assert!(!is_mismatch(&slot(exempt(), exempt())));
        assert!(is_mismatch(&slot(exempt(), num(5.0))));
        assert!(is_mismatch(&slot(num(4.7), exempt())));
    }

    #[test]
    fn test_find_discrepancies_records_details() {
        let mut agg = Aggregator::new();
        agg.record_average("Иванов Пётр", "Алгебра", 0, num(3.4));
        agg.record_actual("Иванов Пётр", "Алгебра", 0, num(4.0));
        agg.record_average("Иванов Пётр", "Алгебра", 1, num(4.5));
        agg.record_actual("Иванов Пётр", "Алгебра", 1, num(5.0));

        let found = find_discrepancies(&agg, PeriodScheme::Terms);
        assert_eq!(
            found,
            vec![Discrepancy {
                student: "Иванов Пётр".into(),
                subject: "Алгебра".into(),
                period: 0,
                average: num(3.4),
                recommended: num(3.0),
                actual: num(4.0),
            }]
        );
    }

    #[test]
    fn test_find_discrepancies_ignores_unused_half_year_slot() {
        let mut agg = Aggregator::new();
        agg.record_average("Иванов Пётр", "Алгебра", 0, num(4.0));
        agg.record_actual("Иванов Пётр", "Алгебра", 0, num(4.0));
        // Slot 2 is not part of a half-year scheme.
        agg.record_actual("Иванов Пётр", "Алгебра", 2, num(5.0));

        assert!(find_discrepancies(&agg, PeriodScheme::HalfYears).is_empty());
        assert_eq!(find_discrepancies(&agg, PeriodScheme::Terms).len(), 1);
    }

    #[test]
    fn test_completeness_over_grid() {
        let averages = [
            MarkValue::Missing,
            num(0.0),
            num(1.0),
            num(2.5),
            num(3.49),
            num(3.5),
            num(4.5),
        ];
        let actuals = [MarkValue::Missing, num(2.0), num(3.0), num(4.0), num(5.0)];

        let mut agg = Aggregator::new();
        let mut expected = 0;
        for (i, average) in averages.iter().enumerate() {
            for (j, actual) in actuals.iter().enumerate() {
                let student = format!("Student {i}{j}");
                agg.record_average(&student, "Алгебра", 0, average.clone());
                agg.record_actual(&student, "Алгебра", 0, actual.clone());
                let rec = recommended_grade(&average.or_zero());
                if !rec.same_grade(&actual.or_zero()) {
                    expected += 1;
                }
            }
        }

        let found = find_discrepancies(&agg, PeriodScheme::Terms);
        assert_eq!(found.len(), expected);
        for d in &found {
            assert!(!d.recommended.same_grade(&d.actual));
        }
    }

    #[test]
    fn test_sort_by_subject_is_stable() {
        let make = |student: &str, subject: &str| Discrepancy {
            student: student.into(),
            subject: subject.into(),
            period: 0,
            average: num(0.0),
            recommended: num(0.0),
            actual: num(3.0),
        };
        let mut list = vec![
            make("Б", "История"),
            make("А", "Алгебра"),
            make("А", "История"),
            make("В", "Алгебра"),
        ];
        sort_by_subject(&mut list);

        let order: Vec<_> = list
            .iter()
            .map(|d| (d.subject.as_str(), d.student.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("Алгебра", "А"), ("Алгебра", "В"), ("История", "Б"), ("История", "А")]
        );
    }
}
