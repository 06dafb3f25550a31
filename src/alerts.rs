//! Flattens the nested general-message payload into displayable strings.

use crate::prim::siri::SiriResponse;

/// Every non-empty message text, in nesting order. Any absent level of the
/// payload yields an empty list, never an error.
pub fn extract_messages(response: &SiriResponse) -> Vec<String> {
    response
        .info_messages()
        .iter()
        .filter_map(|info| info.content.as_ref())
        .flat_map(|content| content.message.iter())
        .filter_map(|message| message.message_text.as_ref())
        .flat_map(|texts| texts.iter())
        .map(|text| text.value.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_flattens_nested_messages() {
        let payload = r#"{
            "Siri": {
                "ServiceDelivery": {
                    "GeneralMessageDelivery": [
                        {
                            "InfoMessage": [
                                {
                                    "Content": {
                                        "Message": [
                                            { "MessageText": [ { "value": "Trafic perturbé" }, { "value": "" } ] },
                                            { "MessageText": { "value": "Reprise estimée à 18h" } }
                                        ]
                                    }
                                },
                                { "Content": { "Message": [] } },
                                {}
                            ]
                        }
                    ]
                }
            }
        }"#;

        let response: SiriResponse = serde_json::from_str(payload).unwrap();
        let messages = extract_messages(&response);
        assert_eq!(
            messages,
            vec!["Trafic perturbé".to_string(), "Reprise estimée à 18h".to_string()]
        );
    }

    #[test]
    fn test_absent_levels_yield_empty() {
        let response: SiriResponse =
            serde_json::from_str(r#"{ "Siri": { "ServiceDelivery": {} } }"#).unwrap();
        assert!(extract_messages(&response).is_empty());

        let response: SiriResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(extract_messages(&response).is_empty());
    }
}
