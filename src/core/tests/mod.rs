mod agent_tests;
mod eligibility_tests;
