use chrono::{DateTime, Utc};

use crate::scrape::record::VacancyRecord;

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.format("%d.%m.%Y %H:%M").to_string(),
        None => "Не указано".to_string(),
    }
}

/// HTML message body for one vacancy, as the bot presents it in chat.
pub fn format_vacancy_message(vacancy: &VacancyRecord) -> String {
    let mut message = format!(
        "<b>{}</b>\n\n🏢 <b>Компания:</b> {}\n",
        vacancy.position, vacancy.company_name
    );

    if let Some(address) = &vacancy.company_address {
        message.push_str(&format!("📍 <b>Адрес:</b> {}\n", address));
    }
    if let Some(salary) = &vacancy.salary {
        message.push_str(&format!("💰 <b>Зарплата:</b> {}\n", salary));
    }
    if let Some(count) = vacancy.vacancies_count {
        message.push_str(&format!("👥 <b>Вакантных мест:</b> {}\n", count));
    }
    if vacancy.date_posted.is_some() {
        message.push_str(&format!(
            "📅 <b>Дата размещения:</b> {}\n",
            format_date(vacancy.date_posted)
        ));
    }
    if let Some(person) = &vacancy.contact_person {
        message.push_str(&format!("👤 <b>Контактное лицо:</b> {}\n", person));
    }
    if let Some(phone) = &vacancy.contact_phone {
        message.push_str(&format!("📞 <b>Телефон:</b> {}\n", phone));
    }
    if let Some(url) = &vacancy.url {
        message.push_str(&format!("\n🔗 <a href='{}'>Подробнее на сайте</a>", url));
    }

    message
}
