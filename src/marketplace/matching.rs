use crate::db::models::{FarmRequest, FarmRequestType, InvestorOffer, OfferType};
use crate::db::store::contains_ci;

pub const MAX_MATCHES: usize = 5;

/// Request kind an offer can serve.
pub fn wanted_request_type(offer_type: OfferType) -> FarmRequestType {
    match offer_type {
        OfferType::InventoryRent => FarmRequestType::Machinery,
        OfferType::Loan => FarmRequestType::Funding,
    }
}

/// Whether `request` is a candidate for `offer`. Missing amounts and equity count as zero.
pub fn is_match(offer: &InvestorOffer, request: &FarmRequest) -> bool {
    if request.request_type != wanted_request_type(offer.offer_type) {
        return false;
    }
    if !contains_ci(&request.location, &offer.location) {
        return false;
    }

    match offer.offer_type {
        OfferType::InventoryRent => true,
        OfferType::Loan => {
            request.amount.unwrap_or(0.0) <= offer.amount.unwrap_or(0.0)
                && request.equity.unwrap_or(0.0) >= offer.min_equity.unwrap_or(0.0)
        }
    }
}

/// The first few requests, in the given order, that suit `offer`.
pub fn find_matches<'a>(offer: &InvestorOffer, requests: impl IntoIterator<Item = &'a FarmRequest>) -> Vec<FarmRequest> {
    requests
        .into_iter()
        .filter(|request| is_match(offer, request))
        .take(MAX_MATCHES)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::FarmRequestStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn request(request_type: FarmRequestType, location: &str, amount: Option<f64>, equity: Option<f64>) -> FarmRequest {
        let now = Utc::now();
        FarmRequest {
            id: Uuid::new_v4(),
            farmer_id: None,
            farmer_name: "Meena".into(),
            request_type,
            location: location.into(),
            contact_mobile: "9000000000".into(),
            description: String::new(),
            status: FarmRequestStatus::Pending,
            machinery_type: None,
            duration_days: None,
            amount,
            equity,
            crop_type: None,
            land_size: None,
            start_date: None,
            end_date: None,
            daily_payment: None,
            workers_needed: 1,
            inventory: None,
            min_equity: None,
            response_count: 0,
            responses: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn offer(offer_type: OfferType, location: &str, amount: Option<f64>, min_equity: Option<f64>) -> InvestorOffer {
        InvestorOffer {
            id: Uuid::new_v4(),
            investor_id: None,
            offer_type,
            location: location.into(),
            amount,
            min_equity,
            description: String::new(),
            contact_mobile: None,
            status: "active".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rent_matches_machinery_by_location() {
        let rent = offer(OfferType::InventoryRent, "nashik", None, None);
        assert!(is_match(&rent, &request(FarmRequestType::Machinery, "Nashik Road", None, None)));
        assert!(!is_match(&rent, &request(FarmRequestType::Machinery, "Pune", None, None)));
        assert!(!is_match(&rent, &request(FarmRequestType::Equipment, "Nashik", None, None)));
    }

    #[test]
    fn test_loan_checks_amount_and_equity() {
        let loan = offer(OfferType::Loan, "Pune", Some(100000.0), Some(10.0));
        assert!(is_match(&loan, &request(FarmRequestType::Funding, "Pune", Some(80000.0), Some(15.0))));
        assert!(!is_match(&loan, &request(FarmRequestType::Funding, "Pune", Some(120000.0), Some(15.0))));
        assert!(!is_match(&loan, &request(FarmRequestType::Funding, "Pune", Some(80000.0), Some(5.0))));
        // no equity on the request counts as zero
        assert!(!is_match(&loan, &request(FarmRequestType::Funding, "Pune", Some(1.0), None)));
        assert!(!is_match(&loan, &request(FarmRequestType::InvestorFunding, "Pune", Some(1.0), Some(50.0))));
    }

    #[test]
    fn test_empty_offer_location_matches_everywhere() {
        let loan = offer(OfferType::Loan, "", None, None);
        assert!(is_match(&loan, &request(FarmRequestType::Funding, "Anywhere", None, None)));
    }

    #[test]
    fn test_matches_capped() {
        let rent = offer(OfferType::InventoryRent, "", None, None);
        let requests: Vec<_> = (0..8).map(|_| request(FarmRequestType::Machinery, "Satara", None, None)).collect();
        let matches = find_matches(&rent, &requests);
        assert_eq!(matches.len(), MAX_MATCHES);
        assert_eq!(matches[0].id, requests[0].id);
    }
}
