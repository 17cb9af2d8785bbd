use crate::error::{
    BadDateTimeFormatterSnafu, CivilDateOutOfRangeSnafu, InvalidLocaleSnafu, InvalidTimezoneSnafu, PortalError,
    PortalResult,
};
use icu::{
    calendar::preferences::CalendarAlgorithm,
    datetime::{
        DateTimeFormatter, DateTimeFormatterPreferences,
        fieldsets::{YMD, YMDT},
        options::{Alignment, TimePrecision},
        preferences::HourCycle,
    },
    locale::Locale,
    time::ZonedDateTime,
};
use jiff::{Timestamp, Zoned, civil::Date, tz::TimeZone};
use jiff_icu::ConvertFrom;
use snafu::ResultExt;

#[derive(Debug, Clone)]
pub struct DateLocaleConfig {
    pub timezone: TimeZone,
    pub locale: Locale,
    dtf_prefs: DateTimeFormatterPreferences,
}

#[derive(Copy, Clone, Debug)]
pub enum DateFormat {
    ShortYMDT,
    ShortYMD,
}

impl DateLocaleConfig {
    fn dtf_prefs_and_locale_from_strings(
        locale: String,
        hour_cycle: String,
        calendar_algorithm: String,
    ) -> PortalResult<(Locale, DateTimeFormatterPreferences)> {
        let locale =
            Locale::try_from_str(&locale).context(InvalidLocaleSnafu { provided: locale })?;
        let hour_cycle = match hour_cycle.as_str() {
            "h23" => HourCycle::H23,
            "h11" => HourCycle::H11,
            "h12" => HourCycle::H12,
            _ => {
                return Err(PortalError::InvalidHourCycle {
                    provided: hour_cycle,
                });
            }
        };
        let calendar_algorithm = match calendar_algorithm.as_str() {
            "gregorian" => CalendarAlgorithm::Iso8601,
            "buddhist" => CalendarAlgorithm::Buddhist,
            "japanese" => CalendarAlgorithm::Japanese,
            "hebrew" => CalendarAlgorithm::Hebrew,
            _ => {
                return Err(PortalError::InvalidCalendarAlgorithm {
                    provided: calendar_algorithm,
                });
            }
        };

        let mut prefs = DateTimeFormatterPreferences::default();
        prefs.locale_preferences = (&locale).into();
        prefs.hour_cycle = Some(hour_cycle);
        prefs.calendar_algorithm = Some(calendar_algorithm);
        Ok((locale, prefs))
    }

    pub fn new(
        timezone: String,
        locale: String,
        hour_cycle: String,
        calendar_algorithm: String,
    ) -> PortalResult<Self> {
        let timezone = TimeZone::get(&timezone).context(InvalidTimezoneSnafu { tz: timezone })?;

        let (locale, dtf_prefs) =
            Self::dtf_prefs_and_locale_from_strings(locale, hour_cycle, calendar_algorithm)?;

        Ok(Self {
            timezone,
            locale,
            dtf_prefs,
        })
    }

    pub fn format(&self, zoned: &Zoned, date_format: DateFormat) -> PortalResult<String> {
        let in_portal_tz = zoned.with_time_zone(self.timezone.clone());
        let zdt = ZonedDateTime::convert_from(&in_portal_tz);

        Ok(match date_format {
            DateFormat::ShortYMDT => DateTimeFormatter::try_new(self.dtf_prefs, {
                let mut fieldset = YMDT::short();
                fieldset.alignment = Some(Alignment::Column);
                fieldset.time_precision = Some(TimePrecision::Minute);
                fieldset
            })
            .context(BadDateTimeFormatterSnafu)?
            .format(&zdt)
            .to_string(),
            DateFormat::ShortYMD => DateTimeFormatter::try_new(self.dtf_prefs, {
                let mut fieldset = YMD::short();
                fieldset.alignment = Some(Alignment::Column);
                fieldset
            })
            .context(BadDateTimeFormatterSnafu)?
            .format(&zdt)
            .to_string(),
        })
    }

    pub fn short_ymd(&self, timestamp: Timestamp) -> PortalResult<String> {
        self.format(&timestamp.to_zoned(TimeZone::UTC), DateFormat::ShortYMD)
    }

    /// Civil dates are shown as written rather than shifted through a time zone.
    pub fn short_date(&self, date: Date) -> PortalResult<String> {
        let zoned = date
            .to_zoned(self.timezone.clone())
            .context(CivilDateOutOfRangeSnafu)?;
        self.format(&zoned, DateFormat::ShortYMD)
    }

    pub fn short_ymdt(&self, timestamp: Timestamp) -> PortalResult<String> {
        self.format(&timestamp.to_zoned(TimeZone::UTC), DateFormat::ShortYMDT)
    }

    /// Today's date where the portal is, which is what the drive date pickers work in.
    pub fn today(&self) -> Date {
        Timestamp::now().to_zoned(self.timezone.clone()).date()
    }
}
